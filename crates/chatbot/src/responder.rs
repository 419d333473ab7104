//! The external completion collaborator.
//!
//! The pipeline only sees the [`Responder`] trait: one prompt in, one
//! reply out. Upstream failures (network, auth, quota) all collapse into
//! [`ResponderError`] and fail the whole request; no subtype is
//! interpreted and nothing is retried.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;

/// Upstream completion failure. Fatal to the in-flight request.
#[derive(Debug, thiserror::Error)]
pub enum ResponderError {
    #[error("completion client setup failed: {0}")]
    Setup(String),

    #[error("completion request failed: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait Responder: Send + Sync {
    /// Complete the assembled prompt for the given owner.
    async fn complete(&self, owner_id: &str, prompt: &str) -> Result<String, ResponderError>;
}

/// Production responder backed by an OpenAI-compatible completions
/// endpoint via rig.
pub struct OpenAiResponder {
    client: openai::CompletionsClient,
    model: String,
}

impl OpenAiResponder {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, ResponderError> {
        let client = openai::CompletionsClient::builder()
            .api_key(api_key)
            .base_url(base_url)
            .build()
            .map_err(|e| ResponderError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Responder for OpenAiResponder {
    async fn complete(&self, _owner_id: &str, prompt: &str) -> Result<String, ResponderError> {
        let agent = self.client.agent(&self.model).build();

        let response: String = agent
            .prompt(prompt)
            .await
            .map_err(|e| ResponderError::Upstream(e.to_string()))?;

        Ok(response)
    }
}

/// Offline responder for false-response mode and the integration tests:
/// returns `"Response message #N"` with a per-owner counter. The counter
/// lives here rather than in process-wide state so two pipelines never
/// share it by accident.
#[derive(Default)]
pub struct CannedResponder {
    counters: Mutex<HashMap<String, u64>>,
}

impl CannedResponder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Responder for CannedResponder {
    async fn complete(&self, owner_id: &str, _prompt: &str) -> Result<String, ResponderError> {
        let mut counters = self.counters.lock().expect("counter lock poisoned");
        let n = counters.entry(owner_id.to_string()).or_insert(0);
        *n += 1;
        Ok(format!("Response message #{n}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn canned_responder_counts_per_owner() {
        let responder = CannedResponder::new();

        assert_eq!(
            responder.complete("a", "ignored").await.unwrap(),
            "Response message #1"
        );
        assert_eq!(
            responder.complete("a", "ignored").await.unwrap(),
            "Response message #2"
        );
        // A different owner starts its own count.
        assert_eq!(
            responder.complete("b", "ignored").await.unwrap(),
            "Response message #1"
        );
        assert_eq!(
            responder.complete("a", "ignored").await.unwrap(),
            "Response message #3"
        );
    }
}
