//! Turns one target-file specification into generated code via the LLM.

use std::collections::BTreeSet;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::chunk::chunk;
use super::extract::decode_object;
use super::memory::ConversationMemory;
use super::prompt::{build_prompt, chunk_suffix, customise, PromptInputs, PromptTemplates};
use super::tokens::estimate_tokens;
use crate::config::Settings;
use crate::error::{MigrationError, Result};
use crate::ports::{CompletionRequest, LlmClient};
use crate::retrieval::RetrievalService;
use crate::structure::FileType;
use crate::usage::{TokenUsage, UsageTracker};

/// Sampling temperature for code generation.
pub const GENERATION_TEMPERATURE: f32 = 0.1;

/// What to generate and where it lives.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Concatenated legacy sources feeding the file.
    pub source_content: String,
    /// Kind of file.
    pub file_type: FileType,
    /// What the file is for.
    pub description: String,
    /// Extra guidance.
    pub instructions: String,
    /// Target file name.
    pub file_name: String,
    /// Namespace to use.
    pub namespace: String,
    /// Owning microservice.
    pub microservice_name: String,
    /// Owning project.
    pub project_name: String,
}

impl GenerationRequest {
    /// Key under which token usage for this file is recorded.
    #[must_use]
    pub fn usage_key(&self) -> String {
        format!("{}/{}/{}", self.microservice_name, self.project_name, self.file_name)
    }
}

/// Decoded model answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    /// File contents.
    pub generated_code: String,
    /// NuGet packages the code needs.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Generates files for one microservice. All collaborators are borrowed, so
/// a worker is cheap to build per microservice.
pub struct CodeGenerationWorker<'a> {
    llm: &'a dyn LlmClient,
    gate: &'a Semaphore,
    templates: &'a PromptTemplates,
    settings: &'a Settings,
    usage: &'a UsageTracker,
    target_version: &'a str,
    context: Option<&'a RetrievalService>,
    analysis: Option<&'a RetrievalService>,
    memory: Option<&'a ConversationMemory>,
}

impl<'a> CodeGenerationWorker<'a> {
    /// Creates a worker without retrieval or memory.
    #[must_use]
    pub fn new(
        llm: &'a dyn LlmClient,
        gate: &'a Semaphore,
        templates: &'a PromptTemplates,
        settings: &'a Settings,
        usage: &'a UsageTracker,
        target_version: &'a str,
    ) -> Self {
        Self {
            llm,
            gate,
            templates,
            settings,
            usage,
            target_version,
            context: None,
            analysis: None,
            memory: None,
        }
    }

    /// Adds the target-structure and analysis indexes used for prompt context.
    #[must_use]
    pub fn with_retrieval(mut self, context: &'a RetrievalService, analysis: &'a RetrievalService) -> Self {
        self.context = Some(context);
        self.analysis = Some(analysis);
        self
    }

    /// Adds the microservice's conversation memory.
    #[must_use]
    pub fn with_memory(mut self, memory: &'a ConversationMemory) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Generates code for `request`.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::PromptTooLarge`] before any LLM call when the prompt
    ///   exceeds the configured limit.
    /// - [`MigrationError::ChunkFailure`] when any chunk of a split file fails.
    /// - The last decode or transport error once retries are exhausted.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedCode> {
        let template = customise(
            &self.templates.template_for(request.file_type, self.target_version),
            &request.microservice_name,
        );
        let query = format!("{} {} {}", request.file_name, request.file_type, request.description);
        let context = self.context.and_then(|r| r.lookup(&query));
        let analysis = self.analysis.and_then(|r| r.lookup(&query));
        let memory = self.memory.map(ConversationMemory::render).unwrap_or_default();

        let inputs = PromptInputs {
            file_name: &request.file_name,
            file_type: request.file_type,
            description: &request.description,
            instructions: &request.instructions,
            namespace: &request.namespace,
            microservice: &request.microservice_name,
            project: &request.project_name,
            target_version: self.target_version,
            template: &template,
            source: &request.source_content,
            context: context.as_deref(),
            analysis: analysis.as_deref(),
            memory: &memory,
        };
        let prompt = build_prompt(&inputs);

        let tokens = estimate_tokens(&prompt);
        let limit = self.settings.prompt_token_limit;
        if tokens > limit {
            return Err(MigrationError::PromptTooLarge {
                file: request.file_name.clone(),
                tokens,
                limit,
            });
        }
        debug!(file = %request.file_name, tokens, "prompt built");

        let key = request.usage_key();
        let source_tokens = estimate_tokens(&request.source_content);
        let generated = if request.file_type.is_chunkable() && source_tokens > self.settings.chunk_tokens {
            self.generate_chunked(&inputs, &key).await?
        } else {
            self.generate_single(&prompt, &key).await?
        };

        if let Some(memory) = self.memory {
            memory.remember(format!(
                "{}/{} ({}) namespace {} deps [{}]",
                request.project_name,
                request.file_name,
                request.file_type,
                request.namespace,
                generated.dependencies.join(", ")
            ));
        }
        Ok(generated)
    }

    async fn generate_single(&self, prompt: &str, key: &str) -> Result<GeneratedCode> {
        let policy = self.settings.retry;
        let mut spent = TokenUsage::default();
        let mut attempt = 1;
        let outcome = loop {
            let (usage, result) = self.call(prompt).await;
            spent += usage;
            match result {
                Ok(code) => break Ok(code),
                Err(err) if policy.should_retry(&err, attempt) => {
                    warn!(key, attempt, error = %err, "generation attempt failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(policy.delay).await;
                }
                Err(err) => break Err(err),
            }
        };
        self.usage.upsert(key, spent);
        outcome
    }

    async fn generate_chunked(&self, inputs: &PromptInputs<'_>, key: &str) -> Result<GeneratedCode> {
        let chunks = chunk(inputs.source, self.settings.chunk_tokens, inputs.file_type);
        let total = chunks.len();
        info!(key, chunks = total, "source split into chunks");

        let prompts: Vec<String> = chunks
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let part = PromptInputs { source: text, ..*inputs };
                format!("{}\n\n{}", build_prompt(&part), chunk_suffix(index, total))
            })
            .collect();
        let outcomes = join_all(prompts.iter().map(|p| self.call(p))).await;

        let mut spent = TokenUsage::default();
        let mut code = Vec::with_capacity(total);
        let mut dependencies = BTreeSet::new();
        let mut failure = None;
        for (index, (usage, result)) in outcomes.into_iter().enumerate() {
            spent += usage;
            match result {
                Ok(part) => {
                    code.push(part.generated_code);
                    dependencies.extend(part.dependencies);
                }
                Err(err) => {
                    if failure.is_none() {
                        failure = Some(MigrationError::ChunkFailure { index, total, source: Box::new(err) });
                    }
                }
            }
        }
        self.usage.upsert(key, spent);

        if let Some(err) = failure {
            return Err(err);
        }
        Ok(GeneratedCode {
            generated_code: code.join("\n"),
            dependencies: dependencies.into_iter().collect(),
        })
    }

    /// One gated LLM call and decode. Usage is returned even when decoding
    /// fails, since the tokens were spent.
    async fn call(&self, prompt: &str) -> (TokenUsage, Result<GeneratedCode>) {
        let request = CompletionRequest {
            model: self.settings.model.clone(),
            prompt: prompt.to_string(),
            max_tokens: self.settings.max_output_tokens,
            temperature: GENERATION_TEMPERATURE,
        };
        let response = {
            let Ok(_permit) = self.gate.acquire().await else {
                return (TokenUsage::default(), Err(MigrationError::Llm("concurrency gate closed".into())));
            };
            self.llm.complete(&request).await
        };
        match response {
            Ok(response) => (TokenUsage::from_response(&response), decode_object(&response.text)),
            Err(e) => (TokenUsage::default(), Err(MigrationError::Llm(e.to_string()))),
        }
    }
}
