//! Adapters that answer from cassettes instead of the outside world.

pub mod llm;
pub mod shell;

use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;

use crate::cassette::replayer::CassetteReplayer;
use crate::ports::PortError;

pub use llm::ReplayingLlmClient;
pub use shell::ReplayingShellExecutor;

/// Pulls the next recorded output for `port::method`.
pub(crate) fn next_output(
    replayer: &Arc<Mutex<CassetteReplayer>>,
    port: &str,
    method: &str,
) -> Result<serde_json::Value, PortError> {
    let mut guard = replayer.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(guard.next_interaction(port, method)?.output)
}

/// Decodes an `{"Ok": v}` / `{"Err": "msg"}` output back into a `Result`.
pub(crate) fn replay_result<T: DeserializeOwned>(output: serde_json::Value) -> Result<T, PortError> {
    if let Some(err) = output.get("Err") {
        return Err(err.as_str().unwrap_or("unknown recorded error").to_string().into());
    }
    let value = output.get("Ok").cloned().unwrap_or(output);
    serde_json::from_value(value).map_err(|e| format!("recorded output has the wrong shape: {e}").into())
}
