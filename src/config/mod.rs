//! Configuration for dealdesk.
//!
//! Settings are loaded with priority: env var > default. `DEALDESK_API_KEY`
//! is the only required value; everything else has a working default. A
//! `.env` in the working directory is honored when the binary loads it via
//! dotenvy before calling [`Config::from_env`].

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::pipeline::ModelRoster;
use crate::store;

/// Main configuration for the runtime.
#[derive(Debug, Clone)]
pub struct Config {
    pub model: ModelConfig,
    pub store: StoreConfig,
}

/// Hosted model provider settings.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Base URL of the provider API, no trailing slash.
    pub base_url: String,
    pub api_key: SecretString,
    pub analyst_model: String,
    pub image_model: String,
    pub image_fallback_model: String,
    pub reasoning_budget: u32,
}

impl ModelConfig {
    /// The model identifiers and budget the pipeline runs with.
    pub fn roster(&self) -> ModelRoster {
        ModelRoster {
            analyst: self.analyst_model.clone(),
            image: self.image_model.clone(),
            image_fallback: self.image_fallback_model.clone(),
            reasoning_budget: self.reasoning_budget,
        }
    }
}

/// Durable store settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = ModelRoster::default();

        let api_key = require_env("DEALDESK_API_KEY").map(SecretString::from)?;
        let base_url = optional_env("DEALDESK_API_BASE_URL")
            .unwrap_or_else(|| "https://api.dealdesk.ai".to_string());
        let base_url = base_url.trim_end_matches('/').to_string();

        let reasoning_budget = match optional_env("DEALDESK_REASONING_BUDGET") {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "DEALDESK_REASONING_BUDGET".to_string(),
                    message: format!("expected a token count, got '{raw}'"),
                })?,
            None => defaults.reasoning_budget,
        };

        let data_dir = optional_env("DEALDESK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(store::default_data_dir);

        Ok(Self {
            model: ModelConfig {
                base_url,
                api_key,
                analyst_model: optional_env("DEALDESK_ANALYST_MODEL")
                    .unwrap_or(defaults.analyst),
                image_model: optional_env("DEALDESK_IMAGE_MODEL").unwrap_or(defaults.image),
                image_fallback_model: optional_env("DEALDESK_IMAGE_FALLBACK_MODEL")
                    .unwrap_or(defaults.image_fallback),
                reasoning_budget,
            },
            store: StoreConfig { data_dir },
        })
    }
}

/// Read an env var, treating empty/whitespace values as absent.
fn optional_env(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(_) => None,
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    optional_env(key).ok_or_else(|| ConfigError::MissingRequired {
        key: key.to_string(),
        hint: "Set it in the environment or a .env file.".to_string(),
    })
}
