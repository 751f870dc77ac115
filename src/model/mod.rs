//! Hosted model provider boundary.
//!
//! The provider is an opaque function: prompt parts plus a config in, text
//! plus grounding references out, fallible and latency-variable. Everything
//! downstream treats the returned text as untrusted input for the sanitizer.

pub mod http;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;

pub use http::HttpModelClient;
pub use scripted::ScriptedModelClient;

/// One part of a prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    /// Raw base64 payload (data-URI prefix already stripped).
    InlineData { mime_type: String, data: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::InlineData {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// Provider-side tools a call may be grounded with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelTool {
    WebSearch,
    MapsGrounding,
}

/// Image-generation options. `size_hint` is only accepted by a subset of
/// model identifiers; callers omit it when invoking one that rejects it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageConfig {
    pub aspect_ratio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_hint: Option<String>,
}

/// Per-call configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateConfig {
    pub reasoning_budget: Option<u32>,
    /// Structural type descriptor the model should target.
    pub response_schema: Option<Value>,
    pub tools: Vec<ModelTool>,
    pub image_config: Option<ImageConfig>,
}

impl GenerateConfig {
    pub fn with_reasoning_budget(mut self, tokens: u32) -> Self {
        self.reasoning_budget = Some(tokens);
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_tool(mut self, tool: ModelTool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_image(mut self, image: ImageConfig) -> Self {
        self.image_config = Some(image);
        self
    }
}

/// Source reference attached by a grounded call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroundingRef {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// Provider output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub grounding: Vec<GroundingRef>,
}

impl ModelResponse {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            grounding: Vec::new(),
        }
    }
}

/// The seam every pipeline step calls through.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(
        &self,
        model_id: &str,
        parts: &[Part],
        config: &GenerateConfig,
    ) -> Result<ModelResponse, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_accumulates() {
        let config = GenerateConfig::default()
            .with_reasoning_budget(4096)
            .with_tool(ModelTool::WebSearch)
            .with_schema(serde_json::json!({"type": "object"}));
        assert_eq!(config.reasoning_budget, Some(4096));
        assert_eq!(config.tools, vec![ModelTool::WebSearch]);
        assert!(config.response_schema.is_some());
        assert!(config.image_config.is_none());
    }

    #[test]
    fn image_config_omits_absent_size_hint() {
        let image = ImageConfig {
            aspect_ratio: "16:9".to_string(),
            size_hint: None,
        };
        let value = serde_json::to_value(&image).unwrap();
        assert!(value.get("size_hint").is_none());
    }
}
