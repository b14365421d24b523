//! Error taxonomy for the migration pipeline and the retry table that
//! decides which failures are worth another LLM call.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Every failure the pipeline distinguishes.
///
/// File-level variants end up in a project's `failed_files`; structural and
/// configuration variants abort the run.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The assembled prompt is above the hard ceiling; no LLM call was made.
    #[error("prompt for {file} is {tokens} tokens, above the {limit} token limit")]
    PromptTooLarge {
        /// Target file the prompt was built for.
        file: String,
        /// Estimated prompt size.
        tokens: usize,
        /// Configured ceiling.
        limit: usize,
    },

    /// No decodable JSON object in the LLM text.
    #[error("malformed LLM response: {0}")]
    MalformedResponse(String),

    /// JSON was found but does not have the expected shape.
    #[error("LLM response failed validation: {0}")]
    InvalidResponse(String),

    /// One part of a chunked generation failed, failing the whole file.
    #[error("chunk {} of {total} failed: {source}", .index + 1)]
    ChunkFailure {
        /// Zero-based chunk index.
        index: usize,
        /// Number of chunks the file was split into.
        total: usize,
        /// What went wrong for that chunk.
        #[source]
        source: Box<MigrationError>,
    },

    /// A retrieval index could not be built or loaded.
    #[error("retrieval index initialization failed: {0}")]
    RetrievalInit(String),

    /// Requested file is not on disk.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Transport-level LLM failure (network, auth, rate limit).
    #[error("LLM call failed: {0}")]
    Llm(String),

    /// Filesystem or archive failure.
    #[error("I/O failure: {0}")]
    Io(String),

    /// The target structure is unusable.
    #[error("invalid target structure: {0}")]
    Structure(String),

    /// Authentication lives in the source but no gateway was proposed to host it.
    #[error("authentication detected but the target structure has no Gateway microservice")]
    MissingGateway,

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The external build tool could not be run or exited non-zero.
    #[error("build tool failed: {0}")]
    BuildTool(String),
}

/// Result alias used across the crate.
pub type Result<T, E = MigrationError> = std::result::Result<T, E>;

impl From<std::io::Error> for MigrationError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Outcome of looking up an error in the retry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Issue the same request again after the policy delay.
    Retry,
    /// Give up and surface the error.
    Fail,
}

/// Fixed-delay retry policy for single-call generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, delay: Duration::from_secs(2) }
    }
}

impl RetryPolicy {
    /// Classifies an error kind. Only decode failures are transient enough
    /// to re-ask the model; everything else fails immediately.
    #[must_use]
    pub fn decide(err: &MigrationError) -> RetryDecision {
        match err {
            MigrationError::MalformedResponse(_) | MigrationError::InvalidResponse(_) => {
                RetryDecision::Retry
            }
            MigrationError::PromptTooLarge { .. }
            | MigrationError::ChunkFailure { .. }
            | MigrationError::RetrievalInit(_)
            | MigrationError::FileNotFound(_)
            | MigrationError::Llm(_)
            | MigrationError::Io(_)
            | MigrationError::Structure(_)
            | MigrationError::MissingGateway
            | MigrationError::Config(_)
            | MigrationError::BuildTool(_) => RetryDecision::Fail,
        }
    }

    /// Returns `true` when `err`, seen on attempt number `attempt` (1-based),
    /// should be followed by another attempt.
    #[must_use]
    pub fn should_retry(&self, err: &MigrationError, attempt: u32) -> bool {
        attempt < self.max_attempts && Self::decide(err) == RetryDecision::Retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_decode_failures_are_retried() {
        assert_eq!(
            RetryPolicy::decide(&MigrationError::MalformedResponse("x".into())),
            RetryDecision::Retry
        );
        assert_eq!(
            RetryPolicy::decide(&MigrationError::InvalidResponse("x".into())),
            RetryDecision::Retry
        );
        assert_eq!(RetryPolicy::decide(&MigrationError::Llm("503".into())), RetryDecision::Fail);
        assert_eq!(
            RetryPolicy::decide(&MigrationError::PromptTooLarge {
                file: "A.cs".into(),
                tokens: 200_000,
                limit: 100_000,
            }),
            RetryDecision::Fail
        );
    }

    #[test]
    fn attempts_are_capped() {
        let policy = RetryPolicy { max_attempts: 3, delay: Duration::ZERO };
        let err = MigrationError::MalformedResponse("no json".into());
        assert!(policy.should_retry(&err, 1));
        assert!(policy.should_retry(&err, 2));
        assert!(!policy.should_retry(&err, 3));
    }

    #[test]
    fn chunk_failure_message_is_one_based() {
        let err = MigrationError::ChunkFailure {
            index: 1,
            total: 3,
            source: Box::new(MigrationError::Llm("timeout".into())),
        };
        assert_eq!(err.to_string(), "chunk 2 of 3 failed: LLM call failed: timeout");
    }
}
