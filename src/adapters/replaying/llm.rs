//! Replaying adapter for the `LlmClient` port.

use std::sync::{Arc, Mutex};

use super::{next_output, replay_result};
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::{CompletionFuture, CompletionRequest, CompletionResponse, LlmClient};

/// Serves recorded completions in recording order.
pub struct ReplayingLlmClient {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingLlmClient {
    /// Creates a client backed by `replayer`.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl LlmClient for ReplayingLlmClient {
    fn complete(&self, _request: &CompletionRequest) -> CompletionFuture<'_> {
        let output = next_output(&self.replayer, "llm", "complete");
        Box::pin(async move { output.and_then(replay_result::<CompletionResponse>) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::{Cassette, Interaction};
    use chrono::Utc;
    use serde_json::json;

    fn client(outputs: Vec<serde_json::Value>) -> ReplayingLlmClient {
        let interactions = outputs
            .into_iter()
            .enumerate()
            .map(|(i, output)| Interaction {
                seq: i as u64,
                port: "llm".into(),
                method: "complete".into(),
                input: json!({}),
                output,
            })
            .collect();
        let cassette =
            Cassette { name: "t".into(), recorded_at: Utc::now(), run_id: String::new(), interactions };
        ReplayingLlmClient::new(Arc::new(Mutex::new(CassetteReplayer::new(&cassette))))
    }

    fn request() -> CompletionRequest {
        CompletionRequest { model: "m".into(), prompt: "p".into(), max_tokens: 1, temperature: 0.0 }
    }

    #[tokio::test]
    async fn serves_ok_then_err_then_exhaustion() {
        let llm = client(vec![
            json!({"Ok": {"text": "{}", "prompt_tokens": 1, "completion_tokens": 1}}),
            json!({"Err": "rate limited"}),
        ]);
        assert_eq!(llm.complete(&request()).await.unwrap().text, "{}");
        assert_eq!(llm.complete(&request()).await.unwrap_err().to_string(), "rate limited");
        let exhausted = llm.complete(&request()).await.unwrap_err().to_string();
        assert!(exhausted.contains("cassette exhausted"));
    }
}
