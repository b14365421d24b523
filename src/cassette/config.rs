//! Which cassette file backs which port during replay.

use std::path::{Path, PathBuf};

use super::format::Cassette;
use super::replayer::CassetteReplayer;

/// Per-port cassette paths. Ports left as `None` are not replayed.
#[derive(Debug, Clone, Default)]
pub struct CassetteConfig {
    /// Cassette for the LLM port.
    pub llm: Option<PathBuf>,
    /// Cassette for the shell port.
    pub shell: Option<PathBuf>,
}

/// Loaded replayers for the configured ports.
pub struct PortReplayers {
    /// Replayer for the LLM port.
    pub llm: Option<CassetteReplayer>,
    /// Replayer for the shell port.
    pub shell: Option<CassetteReplayer>,
}

impl CassetteConfig {
    /// Points both ports at the per-port files a recording session writes
    /// into `dir`.
    #[must_use]
    pub fn from_session_dir(dir: &Path) -> Self {
        let pick = |port: &str| {
            let path = dir.join(format!("{port}.cassette.yaml"));
            path.exists().then_some(path)
        };
        Self { llm: pick("llm"), shell: pick("shell") }
    }

    /// Reads and parses one cassette file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Cassette, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read cassette file {}: {e}", path.display()))?;
        serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse cassette file {}: {e}", path.display()))
    }

    /// Loads every configured cassette.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured cassette cannot be read or parsed.
    pub fn load_all(&self) -> Result<PortReplayers, String> {
        let replayer = |path: &PathBuf| Self::load(path).map(|c| CassetteReplayer::new(&c));
        Ok(PortReplayers {
            llm: self.llm.as_ref().map(replayer).transpose()?,
            shell: self.shell.as_ref().map(replayer).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::recorder::CassetteRecorder;
    use serde_json::json;

    #[test]
    fn session_dir_lookup_skips_missing_ports() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder =
            CassetteRecorder::new(dir.path().join("llm.cassette.yaml"), "llm", "run");
        recorder.record("llm", "complete", json!({}), json!({"Ok": {}}));
        recorder.finish().unwrap();

        let config = CassetteConfig::from_session_dir(dir.path());
        assert!(config.llm.is_some());
        assert!(config.shell.is_none());

        let mut replayers = config.load_all().unwrap();
        let llm = replayers.llm.as_mut().unwrap();
        assert!(llm.next_interaction("llm", "complete").is_ok());
        assert!(replayers.shell.is_none());
    }

    #[test]
    fn unreadable_cassette_is_reported() {
        let config = CassetteConfig {
            llm: Some(PathBuf::from("/nonexistent/llm.cassette.yaml")),
            shell: None,
        };
        let err = config.load_all().err().unwrap();
        assert!(err.contains("Failed to read cassette file"));
    }
}
