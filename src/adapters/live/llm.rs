//! Live `LlmClient` adapter for the Anthropic messages API and
//! OpenAI-compatible chat-completions endpoints.

use std::env;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmProvider;
use crate::ports::llm::{CompletionFuture, CompletionRequest, CompletionResponse, LlmClient};
use crate::ports::PortError;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// HTTP client for the configured provider.
pub struct LiveLlmClient {
    client: Client,
    provider: LlmProvider,
    base_url: String,
}

impl LiveLlmClient {
    /// Creates a client for `provider`, optionally against a custom base URL.
    #[must_use]
    pub fn new(provider: LlmProvider, base_url: Option<String>) -> Self {
        let default_url = match provider {
            LlmProvider::Anthropic => ANTHROPIC_API_URL,
            LlmProvider::OpenAi => OPENAI_API_URL,
        };
        Self {
            client: Client::new(),
            provider,
            base_url: base_url.unwrap_or_else(|| default_url.to_string()).trim_end_matches('/').to_string(),
        }
    }

    async fn complete_anthropic(&self, request: CompletionRequest) -> Result<CompletionResponse, PortError> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| PortError::from("ANTHROPIC_API_KEY environment variable not set"))?;

        let body = AnthropicRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![Message { role: "user", content: &request.prompt }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| -> PortError { format!("Anthropic API request failed: {e}").into() })?;

        let text = read_body(response, "Anthropic").await?;
        let parsed: AnthropicResponse = serde_json::from_str(&text)
            .map_err(|e| -> PortError { format!("Failed to parse Anthropic API response: {e}").into() })?;

        Ok(CompletionResponse {
            text: parsed.content.into_iter().filter_map(|block| block.text).collect(),
            prompt_tokens: parsed.usage.input_tokens,
            completion_tokens: parsed.usage.output_tokens,
        })
    }

    async fn complete_openai(&self, request: CompletionRequest) -> Result<CompletionResponse, PortError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| PortError::from("OPENAI_API_KEY environment variable not set"))?;

        let body = ChatRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![Message { role: "user", content: &request.prompt }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| -> PortError { format!("OpenAI API request failed: {e}").into() })?;

        let text = read_body(response, "OpenAI").await?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| -> PortError { format!("Failed to parse OpenAI API response: {e}").into() })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        let usage = parsed.usage.unwrap_or_default();
        Ok(CompletionResponse {
            text: content,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }
}

/// Reads the body and turns non-2xx statuses into errors carrying the
/// provider's own message when it sent one.
async fn read_body(response: reqwest::Response, provider: &str) -> Result<String, PortError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| -> PortError { format!("Failed to read {provider} API response: {e}").into() })?;
    if !status.is_success() {
        let msg = serde_json::from_str::<ApiError>(&text).map(|e| e.error.message).unwrap_or(text);
        return Err(format!("{provider} API error ({}): {msg}", status.as_u16()).into());
    }
    Ok(text)
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Error envelope shared by both providers.
#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl LlmClient for LiveLlmClient {
    fn complete(&self, request: &CompletionRequest) -> CompletionFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            match self.provider {
                LlmProvider::Anthropic => self.complete_anthropic(request).await,
                LlmProvider::OpenAi => self.complete_openai(request).await,
            }
        })
    }
}
