//! On-disk cassette layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One call made through a port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    /// Position in the recording, assigned by the recorder.
    pub seq: u64,
    /// Port name (`"llm"` or `"shell"`).
    pub port: String,
    /// Method invoked on the port.
    pub method: String,
    /// Serialized call arguments.
    pub input: serde_json::Value,
    /// Serialized result, `{"Ok": ..}` or `{"Err": "..."}`.
    pub output: serde_json::Value,
}

/// A named, timestamped list of interactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cassette {
    /// Human-readable name.
    pub name: String,
    /// When the recording finished.
    pub recorded_at: DateTime<Utc>,
    /// Identifier of the migration run that produced the recording.
    #[serde(default)]
    pub run_id: String,
    /// Interactions in call order.
    pub interactions: Vec<Interaction>,
}

impl Cassette {
    /// Number of interactions recorded for `port`.
    #[must_use]
    pub fn count_for(&self, port: &str) -> usize {
        self.interactions.iter().filter(|i| i.port == port).count()
    }
}
