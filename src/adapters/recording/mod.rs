//! Wrappers that delegate to a live adapter and record every call.

pub mod llm;
pub mod shell;

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::cassette::recorder::CassetteRecorder;

pub use llm::RecordingLlmClient;
pub use shell::RecordingShellExecutor;

/// Records a `Result` using the `{"Ok": v}` / `{"Err": "msg"}` convention
/// that [`super::replaying::replay_result`] reads back.
pub(crate) fn record_result<T, E, I>(
    recorder: &Arc<Mutex<CassetteRecorder>>,
    port: &str,
    method: &str,
    input: &I,
    result: &Result<T, E>,
) where
    T: Serialize,
    E: std::fmt::Display,
    I: Serialize,
{
    let input_json = serde_json::to_value(input).unwrap_or(serde_json::Value::Null);
    let output_json = match result {
        Ok(v) => match serde_json::to_value(v) {
            Ok(inner) => serde_json::json!({ "Ok": inner }),
            Err(e) => serde_json::json!({ "Err": format!("unserializable result: {e}") }),
        },
        Err(e) => serde_json::json!({ "Err": e.to_string() }),
    };

    recorder
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .record(port, method, input_json, output_json);
}
