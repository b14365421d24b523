//! Recording wrapper for the `ShellExecutor` port.

use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::{PortError, ShellExecutor, ShellOutput};

/// Delegates to `inner` and records each command with its output.
pub struct RecordingShellExecutor {
    inner: Box<dyn ShellExecutor>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingShellExecutor {
    /// Wraps `inner`, writing into `recorder`.
    pub fn new(inner: Box<dyn ShellExecutor>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

#[derive(Serialize)]
struct CommandInput<'a> {
    command: &'a str,
    cwd: Option<String>,
}

impl ShellExecutor for RecordingShellExecutor {
    fn run(&self, command: &str, cwd: Option<&Path>) -> Result<ShellOutput, PortError> {
        let result = self.inner.run(command, cwd);
        let input = CommandInput { command, cwd: cwd.map(|p| p.display().to_string()) };
        record_result(&self.recorder, "shell", "run", &input, &result);
        result
    }
}
