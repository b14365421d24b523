//! A recording session: one recorder per recorded port, flushed together.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use super::recorder::CassetteRecorder;

/// Shared recorders for the LLM and shell ports.
///
/// Cassettes land in `<root>/<timestamp>/<port>.cassette.yaml`.
pub struct RecordingSession {
    /// Recorder for LLM interactions.
    pub llm: Arc<Mutex<CassetteRecorder>>,
    /// Recorder for build-tool interactions.
    pub shell: Arc<Mutex<CassetteRecorder>>,
    output_dir: PathBuf,
}

impl RecordingSession {
    /// Starts a session under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the timestamped directory already exists or
    /// cannot be created.
    pub fn new(root: &Path, run_id: &str) -> Result<Self, String> {
        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let output_dir = root.join(&timestamp);
        if output_dir.exists() {
            return Err(format!("Cassette directory already exists: {}", output_dir.display()));
        }
        std::fs::create_dir_all(&output_dir)
            .map_err(|e| format!("Failed to create cassette directory: {e}"))?;

        let make = |port: &str| {
            Arc::new(Mutex::new(CassetteRecorder::new(
                output_dir.join(format!("{port}.cassette.yaml")),
                format!("{timestamp}-{port}"),
                run_id,
            )))
        };
        Ok(Self { llm: make("llm"), shell: make("shell"), output_dir })
    }

    /// Directory the cassettes are written into.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes every cassette. All adapters holding recorder handles must
    /// have been dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if a recorder is still shared or a file cannot be written.
    pub fn finish(self) -> Result<PathBuf, String> {
        fn finish_one(arc: Arc<Mutex<CassetteRecorder>>, port: &str) -> Result<(), String> {
            let recorder = Arc::try_unwrap(arc)
                .map_err(|_| format!("Recording adapter for {port} still has references"))?
                .into_inner()
                .map_err(|e| format!("Recorder lock for {port} poisoned: {e}"))?;
            recorder.finish().map_err(|e| format!("Failed to write {port} cassette: {e}"))?;
            Ok(())
        }

        finish_one(self.llm, "llm")?;
        finish_one(self.shell, "shell")?;
        Ok(self.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_writes_one_cassette_per_port() {
        let root = tempfile::tempdir().unwrap();
        let session = RecordingSession::new(root.path(), "run-42").unwrap();
        assert!(session.output_dir().exists());

        let dir = session.finish().unwrap();
        assert!(dir.join("llm.cassette.yaml").exists());
        assert!(dir.join("shell.cassette.yaml").exists());
    }

    #[test]
    fn finish_fails_while_an_adapter_holds_a_recorder() {
        let root = tempfile::tempdir().unwrap();
        let session = RecordingSession::new(root.path(), "run").unwrap();
        let _held = Arc::clone(&session.llm);
        let err = session.finish().unwrap_err();
        assert!(err.contains("still has references"));
    }
}
