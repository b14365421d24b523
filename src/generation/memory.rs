//! Token-bounded conversation memory shared by the files of one microservice.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use super::tokens::estimate_tokens;

/// Rolling notes about what has already been generated, oldest dropped first
/// once the token budget is exceeded. The newest note is always kept.
#[derive(Debug)]
pub struct ConversationMemory {
    limit: usize,
    entries: Mutex<VecDeque<String>>,
}

impl ConversationMemory {
    /// Creates an empty memory holding at most `limit` estimated tokens.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { limit, entries: Mutex::new(VecDeque::new()) }
    }

    /// Appends a note, evicting the oldest ones past the budget.
    pub fn remember(&self, note: impl Into<String>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_back(note.into());
        let mut used: usize = entries.iter().map(|e| estimate_tokens(e)).sum();
        while used > self.limit && entries.len() > 1 {
            if let Some(evicted) = entries.pop_front() {
                used -= estimate_tokens(&evicted);
            }
        }
    }

    /// All notes, oldest first, one per line.
    #[must_use]
    pub fn render(&self) -> String {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }

    /// Number of notes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` when nothing has been remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
