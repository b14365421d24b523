//! Recording wrapper for the `LlmClient` port.

use std::sync::{Arc, Mutex};

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::{CompletionFuture, CompletionRequest, LlmClient};

/// Delegates to `inner` and records each request with its outcome.
pub struct RecordingLlmClient {
    inner: Box<dyn LlmClient>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingLlmClient {
    /// Wraps `inner`, writing into `recorder`.
    pub fn new(inner: Box<dyn LlmClient>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

impl LlmClient for RecordingLlmClient {
    fn complete(&self, request: &CompletionRequest) -> CompletionFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let result = self.inner.complete(&request).await;
            record_result(&self.recorder, "llm", "complete", &request, &result);
            result
        })
    }
}
