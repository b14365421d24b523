//! Shell port for the external build tool.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::PortError;

/// Captured result of one command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShellOutput {
    /// Process exit code (`-1` when killed by a signal).
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ShellOutput {
    /// Returns `true` when the command exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs shell commands, optionally inside a working directory.
pub trait ShellExecutor: Send + Sync {
    /// Runs `command` through the system shell.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned. A non-zero exit is
    /// reported through [`ShellOutput::exit_code`], not as an error.
    fn run(&self, command: &str, cwd: Option<&Path>) -> Result<ShellOutput, PortError>;
}
