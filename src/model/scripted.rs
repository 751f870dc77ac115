//! Deterministic model client for tests and offline dry runs.
//!
//! Responses are dequeued in call order; every call is recorded so tests can
//! assert on the model ids, prompts, and configs the pipeline produced.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::ModelError;

use super::{GenerateConfig, ModelClient, ModelResponse, Part};

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model_id: String,
    /// Text parts joined with newlines; inline parts contribute a marker.
    pub prompt: String,
    pub config: GenerateConfig,
}

/// Scripted [`ModelClient`].
#[derive(Default)]
pub struct ScriptedModelClient {
    queue: Mutex<VecDeque<Result<ModelResponse, ModelError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain-text response.
    pub async fn push_text(&self, text: impl Into<String>) {
        self.queue
            .lock()
            .await
            .push_back(Ok(ModelResponse::text_only(text)));
    }

    /// Queue a full response.
    pub async fn push_response(&self, response: ModelResponse) {
        self.queue.lock().await.push_back(Ok(response));
    }

    /// Queue a failure.
    pub async fn push_error(&self, err: ModelError) {
        self.queue.lock().await.push_back(Err(err));
    }

    /// Everything the pipeline asked for, in order.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    /// Responses still queued.
    pub async fn remaining(&self) -> usize {
        self.queue.lock().await.len()
    }
}

fn render_prompt(parts: &[Part]) -> String {
    parts
        .iter()
        .map(|part| match part {
            Part::Text { text } => text.clone(),
            Part::InlineData { mime_type, .. } => format!("[inline {mime_type}]"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn generate(
        &self,
        model_id: &str,
        parts: &[Part],
        config: &GenerateConfig,
    ) -> Result<ModelResponse, ModelError> {
        self.calls.lock().await.push(RecordedCall {
            model_id: model_id.to_string(),
            prompt: render_prompt(parts),
            config: config.clone(),
        });

        self.queue.lock().await.pop_front().unwrap_or_else(|| {
            Err(ModelError::RequestFailed {
                model: model_id.to_string(),
                reason: "script exhausted".to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dequeues_in_order_and_records_calls() {
        let client = ScriptedModelClient::new();
        client.push_text("first").await;
        client.push_text("second").await;

        let config = GenerateConfig::default();
        let one = client
            .generate("m", &[Part::text("a")], &config)
            .await
            .unwrap();
        let two = client
            .generate("m", &[Part::text("b")], &config)
            .await
            .unwrap();
        assert_eq!(one.text, "first");
        assert_eq!(two.text, "second");

        let calls = client.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].prompt, "a");
        assert_eq!(calls[1].prompt, "b");
    }

    #[tokio::test]
    async fn exhausted_script_fails_loudly() {
        let client = ScriptedModelClient::new();
        let err = client
            .generate("m", &[Part::text("a")], &GenerateConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("script exhausted"));
    }
}
