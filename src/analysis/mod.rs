//! The analysis phase: scanning the legacy tree, per-file LLM analysis and
//! the target-structure proposal the generation phase consumes.

pub mod target;
pub mod tree;

use std::path::{Path, PathBuf};

use futures::future::join_all;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::context::ServiceContext;
use crate::error::{MigrationError, Result};
use crate::generation::decode_object;
use crate::migrate::walker::slash_path;
use crate::migrate::Variant;
use crate::ports::{CompletionRequest, FileSystem, LlmClient};
use crate::structure::{clear_empty_folders, detect_auth, sanitize_gateway, AuthCase, TargetStructure};
use crate::usage::{TokenUsage, UsageTracker};
use target::{build_target_prompt, derive_service_names, instruction_or_default, parse_service_names, AUTH_SERVICE};
pub use tree::FileAnalysis;
use tree::{analysed_paths, analyzable_files, insert_path};

/// Sampling temperature for analysis and proposal calls.
pub const ANALYSIS_TEMPERATURE: f32 = 0.2;

fn analysis_prompt(code: &str) -> String {
    format!(
        "Analyze this C# code file for migration purposes.

Code content:
{code}

Respond with ONLY a JSON object with these fields:
- \"file_type\": one of controller, config, view, model, repository, layout, service, middleware, program (for Program.cs), csproj, csproj_grpc, program_cs_grpc
- \"description\": the file's purpose
- \"classnames\", \"namespace\", \"methods\", \"external_references\", \"framework_features\", \"dependencies\", \"patterns_used\": lists of strings
- \"routes\": for controllers only, taken from [Route], [HttpGet], [HttpPost], [HttpPut] and [HttpDelete] attributes; when none exist, infer /api/<name>s from the controller name (CustomerController gives /api/customers and /api/customers/{{id}})
- \"extra_notes\": anything else relevant
When ASPX markup is present, infer entity fields from control IDs (txtFirstName gives FirstName) and keep the original field names."
    )
}

/// Analyses one legacy source tree.
pub struct ProjectAnalyzer<'a> {
    llm: &'a dyn LlmClient,
    fs: &'a dyn FileSystem,
    gate: &'a Semaphore,
    settings: &'a Settings,
    usage: &'a UsageTracker,
    root: PathBuf,
}

impl<'a> ProjectAnalyzer<'a> {
    /// Creates an analyzer for the tree at `root`.
    #[must_use]
    pub fn new(
        ctx: &'a ServiceContext,
        gate: &'a Semaphore,
        settings: &'a Settings,
        usage: &'a UsageTracker,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self { llm: ctx.llm.as_ref(), fs: ctx.fs.as_ref(), gate, settings, usage, root: root.into() }
    }

    /// The source tree with every file marked `"file"`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Io`] when the tree cannot be walked.
    pub fn basic_tree(&self) -> Result<Value> {
        tree::basic_tree(&self.root)
    }

    /// Asks the model about one file. Ineligible files, unreadable files and
    /// failed calls yield `None`; failures are logged.
    pub async fn analyze_file(&self, path: &Path) -> Option<FileAnalysis> {
        if !tree::is_analyzable(path) {
            return None;
        }
        let rel = path.strip_prefix(&self.root).map_or_else(|_| slash_path(path), slash_path);
        match self.try_analyze(path, &rel).await {
            Ok(analysis) => {
                debug!(file = %rel, file_type = %analysis.file_type, "file analysed");
                Some(analysis)
            }
            Err(err) => {
                warn!(file = %rel, error = %err, "file analysis failed, skipping");
                None
            }
        }
    }

    async fn try_analyze(&self, path: &Path, rel: &str) -> Result<FileAnalysis> {
        let mut code = self.fs.read_to_string(path).map_err(|e| MigrationError::Io(e.to_string()))?;
        let name = path.to_string_lossy();
        if let Some(markup_path) = name.strip_suffix(".cs").filter(|p| p.ends_with(".aspx")) {
            let markup_path = Path::new(markup_path);
            if self.fs.exists(markup_path) {
                let markup = self.fs.read_to_string(markup_path).map_err(|e| MigrationError::Io(e.to_string()))?;
                code.push_str("\n\n// Corresponding ASPX Markup:\n");
                code.push_str(&markup);
            }
        }
        let text = self.complete(analysis_prompt(&code), &format!("analysis/{rel}")).await?;
        decode_object(&text)
    }

    /// One gated completion, with usage filed under `usage_key`.
    async fn complete(&self, prompt: String, usage_key: &str) -> Result<String> {
        let request = CompletionRequest {
            model: self.settings.model.clone(),
            prompt,
            max_tokens: self.settings.max_output_tokens,
            temperature: ANALYSIS_TEMPERATURE,
        };
        let response = {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| MigrationError::Llm("concurrency gate closed".into()))?;
            self.llm.complete(&request).await
        }
        .map_err(|e| MigrationError::Llm(e.to_string()))?;
        self.usage.upsert(usage_key, TokenUsage::from_response(&response));
        Ok(response.text)
    }

    /// Analyses every eligible file concurrently (bounded by the gate) and
    /// nests the results by path. Files whose analysis failed are absent.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Io`] when the tree cannot be walked.
    pub async fn analyzed_tree(&self) -> Result<Value> {
        let files = analyzable_files(&self.root)?;
        info!(root = %self.root.display(), files = files.len(), "analysing source files");
        let analyses = join_all(files.iter().map(|path| self.analyze_file(path))).await;

        let mut tree = Map::new();
        let mut analysed = 0usize;
        for (path, analysis) in files.iter().zip(analyses) {
            let Some(analysis) = analysis else {
                continue;
            };
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            let value = serde_json::to_value(&analysis).map_err(|e| MigrationError::Io(e.to_string()))?;
            insert_path(&mut tree, &slash_path(rel), value);
            analysed += 1;
        }
        info!(analysed, skipped = files.len() - analysed, "analysis finished");
        Ok(Value::Object(tree))
    }

    /// Proposes a target structure for `analysis`, then applies gateway
    /// sanitization and prunes empty folders.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::Llm`] when the call fails.
    /// - [`MigrationError::MalformedResponse`] or
    ///   [`MigrationError::InvalidResponse`] when the answer does not decode.
    /// - [`MigrationError::MissingGateway`] when authentication must live in
    ///   a gateway that was not proposed.
    /// - [`MigrationError::Structure`] when the result is still invalid.
    pub async fn create_target_structure(
        &self,
        analysis: &Value,
        target_version: &str,
        instruction: Option<&str>,
        variant: Variant,
    ) -> Result<TargetStructure> {
        let instruction = instruction_or_default(instruction, variant);
        let paths = analysed_paths(analysis);
        let has_auth = detect_auth(paths.iter().map(String::as_str));
        let case = AuthCase::decide(has_auth, &instruction);

        let mut services = parse_service_names(&instruction, variant);
        if services.is_empty() {
            warn!(instruction = %instruction, "no microservices named in the instruction, deriving from the source");
            services = derive_service_names(&paths, variant);
        }
        if case == AuthCase::Dedicated && !services.iter().any(|s| s == AUTH_SERVICE) {
            services.push(AUTH_SERVICE.to_string());
        }
        info!(has_auth, case = ?case, services = ?services, variant = ?variant, "proposing target structure");

        let prompt = build_target_prompt(analysis, target_version, &instruction, &services, case, variant);
        let text = self.complete(prompt, "analysis/target_structure").await?;
        let mut structure: TargetStructure = decode_object(&text)?;

        sanitize_gateway(&mut structure, case)?;
        clear_empty_folders(&mut structure);
        structure.validate()?;
        info!(
            microservices = structure.microservices.len(),
            projects = structure.project_count(),
            "target structure ready"
        );
        Ok(structure)
    }
}
