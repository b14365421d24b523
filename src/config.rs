//! Runtime settings loaded from the environment (and `.env`, via `dotenvy`
//! in `main`).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{MigrationError, Result, RetryPolicy};

/// LLM provider the live adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Anthropic messages API.
    Anthropic,
    /// Any OpenAI-compatible chat-completions endpoint.
    OpenAi,
}

impl LlmProvider {
    /// Parses a provider name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Config`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            other => Err(MigrationError::Config(format!("unsupported LLM provider: {other}"))),
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAi => "gpt-4o-mini",
        }
    }
}

/// Every tunable of a migration run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Which provider the live LLM adapter calls.
    pub provider: LlmProvider,
    /// Model identifier passed with every request.
    pub model: String,
    /// Override for the provider base URL.
    pub base_url: Option<String>,
    /// Output token cap per LLM call.
    pub max_output_tokens: u32,
    /// Width of the shared LLM concurrency gate.
    pub max_concurrency: usize,
    /// Retry table parameters for single-call generation.
    pub retry: RetryPolicy,
    /// Source size (estimated tokens) above which chunkable files are split.
    pub chunk_tokens: usize,
    /// Hard ceiling on estimated prompt tokens.
    pub prompt_token_limit: usize,
    /// Token budget of a microservice's conversation memory.
    pub memory_tokens: usize,
    /// YAML file with per-file-type prompt templates.
    pub prompts_path: Option<PathBuf>,
    /// Build tool used to create solution files.
    pub build_tool: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            model: LlmProvider::Anthropic.default_model().to_string(),
            base_url: None,
            max_output_tokens: 8192,
            max_concurrency: 10,
            retry: RetryPolicy::default(),
            chunk_tokens: 10_000,
            prompt_token_limit: 100_000,
            memory_tokens: 3_000,
            prompts_path: None,
            build_tool: "dotnet".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from `DOTMIGRATE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Config`] when a variable is present but invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads settings through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Config`] when a value is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |name: &str| lookup(&format!("DOTMIGRATE_{name}")).filter(|v| !v.is_empty());

        let provider = get("LLM_PROVIDER")
            .map(|v| LlmProvider::parse(&v))
            .transpose()?
            .unwrap_or(defaults.provider);
        let model = get("LLM_MODEL").unwrap_or_else(|| provider.default_model().to_string());

        let retry = RetryPolicy {
            max_attempts: parse_number(get("RETRY_ATTEMPTS"), "RETRY_ATTEMPTS")?
                .unwrap_or(defaults.retry.max_attempts),
            delay: parse_number(get("RETRY_DELAY_MS"), "RETRY_DELAY_MS")?
                .map_or(defaults.retry.delay, Duration::from_millis),
        };

        let settings = Self {
            provider,
            model,
            base_url: get("LLM_BASE_URL"),
            max_output_tokens: parse_number(get("LLM_MAX_TOKENS"), "LLM_MAX_TOKENS")?
                .unwrap_or(defaults.max_output_tokens),
            max_concurrency: parse_number(get("MAX_CONCURRENCY"), "MAX_CONCURRENCY")?
                .unwrap_or(defaults.max_concurrency),
            retry,
            chunk_tokens: parse_number(get("CHUNK_TOKENS"), "CHUNK_TOKENS")?
                .unwrap_or(defaults.chunk_tokens),
            prompt_token_limit: parse_number(get("PROMPT_TOKEN_LIMIT"), "PROMPT_TOKEN_LIMIT")?
                .unwrap_or(defaults.prompt_token_limit),
            memory_tokens: parse_number(get("MEMORY_TOKENS"), "MEMORY_TOKENS")?
                .unwrap_or(defaults.memory_tokens),
            prompts_path: get("PROMPTS").map(PathBuf::from),
            build_tool: get("BUILD_TOOL").unwrap_or(defaults.build_tool),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects values that would stall or break the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Config`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(MigrationError::Config("MAX_CONCURRENCY must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(MigrationError::Config("RETRY_ATTEMPTS must be at least 1".into()));
        }
        if self.chunk_tokens == 0 {
            return Err(MigrationError::Config("CHUNK_TOKENS must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(raw: Option<String>, name: &str) -> Result<Option<T>> {
    raw.map(|v| {
        v.trim().parse::<T>().map_err(|_| {
            MigrationError::Config(format!("DOTMIGRATE_{name} must be a number, got {v:?}"))
        })
    })
    .transpose()
}
