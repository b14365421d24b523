//! Replaying adapter for the `ShellExecutor` port.

use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{next_output, replay_result};
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::{PortError, ShellExecutor, ShellOutput};

/// Serves recorded command outputs in recording order.
pub struct ReplayingShellExecutor {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingShellExecutor {
    /// Creates an executor backed by `replayer`.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl ShellExecutor for ReplayingShellExecutor {
    fn run(&self, _command: &str, _cwd: Option<&Path>) -> Result<ShellOutput, PortError> {
        replay_result(next_output(&self.replayer, "shell", "run")?)
    }
}
