//! Serves recorded interactions back in order, per port and method.

use std::collections::{HashMap, VecDeque};

use super::format::{Cassette, Interaction};

/// Replays a loaded cassette.
///
/// Each `port::method` pair has its own queue, so interleaving between ports
/// does not have to match the recording exactly.
pub struct CassetteReplayer {
    queues: HashMap<(String, String), VecDeque<Interaction>>,
}

impl CassetteReplayer {
    /// Indexes every interaction of `cassette`.
    #[must_use]
    pub fn new(cassette: &Cassette) -> Self {
        let mut queues: HashMap<(String, String), VecDeque<Interaction>> = HashMap::new();
        for interaction in &cassette.interactions {
            queues
                .entry((interaction.port.clone(), interaction.method.clone()))
                .or_default()
                .push_back(interaction.clone());
        }
        Self { queues }
    }

    /// Pops the next interaction recorded for `port::method`.
    ///
    /// # Errors
    ///
    /// Returns a message naming the request and the pairs that are still
    /// available when nothing is left for this pair.
    pub fn next_interaction(&mut self, port: &str, method: &str) -> Result<Interaction, String> {
        let key = (port.to_string(), method.to_string());
        if let Some(next) = self.queues.get_mut(&key).and_then(VecDeque::pop_front) {
            return Ok(next);
        }
        let mut available: Vec<String> = self
            .queues
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|((p, m), queue)| format!("{p}::{m} ({})", queue.len()))
            .collect();
        available.sort();
        Err(format!(
            "cassette exhausted for {port}::{method}; remaining: [{}]",
            available.join(", ")
        ))
    }

    /// Interactions not yet consumed, across all pairs.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}
