//! Accumulates interactions and writes them out as a cassette.

use std::path::PathBuf;

use chrono::Utc;

use super::format::{Cassette, Interaction};

/// In-memory recording for one port, flushed to YAML by [`Self::finish`].
#[derive(Debug)]
pub struct CassetteRecorder {
    path: PathBuf,
    name: String,
    run_id: String,
    interactions: Vec<Interaction>,
}

impl CassetteRecorder {
    /// Creates a recorder that will write to `path`.
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            run_id: run_id.into(),
            interactions: Vec::new(),
        }
    }

    /// Appends an interaction; its `seq` is its position in the recording.
    pub fn record(
        &mut self,
        port: impl Into<String>,
        method: impl Into<String>,
        input: serde_json::Value,
        output: serde_json::Value,
    ) {
        let seq = self.interactions.len() as u64;
        self.interactions.push(Interaction {
            seq,
            port: port.into(),
            method: method.into(),
            input,
            output,
        });
    }

    /// Number of interactions recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Returns `true` when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Writes the cassette and returns its path.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn finish(self) -> Result<PathBuf, std::io::Error> {
        let cassette = Cassette {
            name: self.name,
            recorded_at: Utc::now(),
            run_id: self.run_id,
            interactions: self.interactions,
        };
        let yaml = serde_yaml::to_string(&cassette).map_err(std::io::Error::other)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, yaml)?;
        Ok(self.path)
    }
}
