//! LLM completion port.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::PortError;

/// Boxed future returned by [`LlmClient::complete`], keeping the trait dyn-compatible.
pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionResponse, PortError>> + Send + 'a>>;

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Full prompt text, sent as one user message.
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,
}

/// The provider's answer to a [`CompletionRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionResponse {
    /// Generated text.
    pub text: String,
    /// Prompt tokens billed by the provider (0 when unknown).
    pub prompt_tokens: u32,
    /// Completion tokens billed by the provider (0 when unknown).
    pub completion_tokens: u32,
}

/// Sends completion requests to a language model.
pub trait LlmClient: Send + Sync {
    /// Generates a completion for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails (network, auth, rate-limit, etc.).
    fn complete(&self, request: &CompletionRequest) -> CompletionFuture<'_>;
}
