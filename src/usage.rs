//! Process-wide token accounting.

use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::ports::CompletionResponse;

/// Tokens spent by one or more LLM calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of completed calls.
    pub calls: u32,
    /// Prompt tokens reported by the provider.
    pub prompt_tokens: u64,
    /// Completion tokens reported by the provider.
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Usage of a single completed call.
    #[must_use]
    pub fn from_response(response: &CompletionResponse) -> Self {
        Self {
            calls: 1,
            prompt_tokens: u64::from(response.prompt_tokens),
            completion_tokens: u64::from(response.completion_tokens),
        }
    }

    /// Prompt plus completion tokens.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.calls += rhs.calls;
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
    }
}

/// Usage per key (`microservice/project/file`, `analysis/<path>`, ...).
///
/// Each key is written as a whole record; concurrent writers to different
/// keys never interleave partial updates.
#[derive(Debug, Default)]
pub struct UsageTracker {
    entries: Mutex<BTreeMap<String, TokenUsage>>,
}

impl UsageTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the record stored under `key`.
    pub fn upsert(&self, key: impl Into<String>, usage: TokenUsage) {
        self.lock().insert(key.into(), usage);
    }

    /// The record stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<TokenUsage> {
        self.lock().get(key).copied()
    }

    /// A copy of every record, ordered by key.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, TokenUsage> {
        self.lock().clone()
    }

    /// Sum over all records.
    #[must_use]
    pub fn totals(&self) -> TokenUsage {
        let mut sum = TokenUsage::default();
        for usage in self.lock().values() {
            sum += *usage;
        }
        sum
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, TokenUsage>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
