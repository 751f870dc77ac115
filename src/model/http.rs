//! reqwest-backed implementation of the model boundary.
//!
//! Speaks a minimal JSON dialect to the hosted provider: parts and config in
//! one POST, text and grounding references back. No retries here; the step
//! runner observes failures and call sites own any fallback policy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ModelError;

use super::{GenerateConfig, GroundingRef, ModelClient, ModelResponse, ModelTool, Part};

/// Max characters of an error body carried into a [`ModelError`].
const ERROR_BODY_MAX: usize = 400;

/// HTTP client for the hosted model API.
pub struct HttpModelClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpModelClient {
    /// Build a client for `base_url` (no trailing slash) with a bearer key.
    ///
    /// Only connection establishment is bounded. Generation calls can run
    /// long and a run waits as long as the provider takes, so there is no
    /// overall request timeout.
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(20))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    text: String,
    #[serde(default, rename = "groundingReferences")]
    grounding_references: Vec<GroundingRef>,
}

/// Assemble the request body from parts and config.
fn build_request_body(parts: &[Part], config: &GenerateConfig) -> Value {
    let contents: Vec<Value> = parts
        .iter()
        .map(|part| match part {
            Part::Text { text } => json!({ "text": text }),
            Part::InlineData { mime_type, data } => json!({
                "inlineData": { "mimeType": mime_type, "data": data }
            }),
        })
        .collect();

    let mut body = json!({ "contents": contents });

    if let Some(budget) = config.reasoning_budget {
        body["reasoningBudget"] = json!(budget);
    }
    if let Some(schema) = &config.response_schema {
        body["responseSchema"] = schema.clone();
    }
    if !config.tools.is_empty() {
        body["tools"] = Value::Array(
            config
                .tools
                .iter()
                .map(|tool| match tool {
                    ModelTool::WebSearch => json!({ "webSearch": {} }),
                    ModelTool::MapsGrounding => json!({ "mapsGrounding": {} }),
                })
                .collect(),
        );
    }
    if let Some(image) = &config.image_config {
        let mut image_body = json!({ "aspectRatio": image.aspect_ratio });
        if let Some(hint) = &image.size_hint {
            image_body["sizeHint"] = json!(hint);
        }
        body["imageConfig"] = image_body;
    }

    body
}

/// Map a non-success status plus body onto the error taxonomy.
fn map_failure(model: &str, status: StatusCode, body: &str) -> ModelError {
    let mut detail = body.trim().to_string();
    if detail.len() > ERROR_BODY_MAX {
        let mut cut = ERROR_BODY_MAX;
        while !detail.is_char_boundary(cut) {
            cut -= 1;
        }
        detail.truncate(cut);
    }
    let model = model.to_string();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ModelError::PermissionDenied {
            model,
            reason: detail,
        },
        StatusCode::TOO_MANY_REQUESTS => {
            if detail.contains("RESOURCE_EXHAUSTED") || detail.to_ascii_lowercase().contains("quota")
            {
                ModelError::QuotaExhausted {
                    model,
                    reason: detail,
                }
            } else {
                ModelError::RateLimited { model }
            }
        }
        other => ModelError::RequestFailed {
            model,
            reason: format!("HTTP {other}: {detail}"),
        },
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn generate(
        &self,
        model_id: &str,
        parts: &[Part],
        config: &GenerateConfig,
    ) -> Result<ModelResponse, ModelError> {
        let url = format!("{}/v1/models/{}:generate", self.base_url, model_id);
        let body = build_request_body(parts, config);

        tracing::debug!(model = model_id, tools = config.tools.len(), "model request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_failure(model_id, status, &body));
        }

        let wire: WireResponse =
            response
                .json()
                .await
                .map_err(|e| ModelError::InvalidResponse {
                    model: model_id.to_string(),
                    reason: e.to_string(),
                })?;

        if wire.text.trim().is_empty() {
            return Err(ModelError::EmptyResponse {
                model: model_id.to_string(),
            });
        }

        Ok(ModelResponse {
            text: wire.text,
            grounding: wire.grounding_references,
        })
    }
}
