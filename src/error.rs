//! Error types for dealdesk.

use serde::{Deserialize, Serialize};

/// Top-level error type for the runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Response parse error: {0}")]
    Sanitize(#[from] crate::sanitize::JsonParseError),

    #[error("Attachment error: {0}")]
    Attachment(#[from] AttachmentError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable key-value store errors.
///
/// These only surface from hydration paths; write-back failures are logged
/// and swallowed because in-memory state stays authoritative for the session.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read key {key}: {reason}")]
    Read { key: String, reason: String },

    #[error("Failed to write key {key}: {reason}")]
    Write { key: String, reason: String },

    #[error("Failed to clear store: {0}")]
    Clear(String),

    #[error("Serialization error for key {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Hosted model provider errors.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model {model} request failed: {reason}")]
    RequestFailed { model: String, reason: String },

    #[error("Model {model} rate limited")]
    RateLimited { model: String },

    #[error("Permission denied for model {model}: {reason}")]
    PermissionDenied { model: String, reason: String },

    #[error("Quota exhausted for model {model}: {reason}")]
    QuotaExhausted { model: String, reason: String },

    #[error("Invalid response from model {model}: {reason}")]
    InvalidResponse { model: String, reason: String },

    #[error("Model {model} returned an empty response")]
    EmptyResponse { model: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    /// Whether this failure should trigger the one-shot fallback-model retry
    /// at best-effort call sites (concept image generation).
    ///
    /// Matches the error class directly where known, and falls back to
    /// substring checks because providers encode permission/quota failures
    /// inconsistently across transports.
    pub fn is_permission_or_quota(&self) -> bool {
        match self {
            Self::PermissionDenied { .. } | Self::QuotaExhausted { .. } | Self::RateLimited { .. } => {
                true
            }
            other => {
                let message = other.to_string().to_ascii_lowercase();
                message.contains("permission")
                    || message.contains("quota")
                    || message.contains("resource_exhausted")
                    || message.contains("403")
                    || message.contains("429")
            }
        }
    }
}

/// Orchestration-run errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Candidate search returned no candidates for mandate: {mandate}")]
    NoCandidates { mandate: String },

    #[error("No active deal to operate on")]
    NoActiveDeal,
}

/// Attachment ingestion errors.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("Attachment {name} carries no payload")]
    EmptyPayload { name: String },

    #[error("Attachment {name} is not valid base64: {reason}")]
    InvalidBase64 { name: String, reason: String },

    #[error("Attachment {name} exceeds maximum size: {size} > {max} bytes")]
    TooLarge { name: String, size: usize, max: usize },
}

/// Terminal channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Readline error: {0}")]
    Readline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error detail attached to a failed pipeline step record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepErrorDetail {
    pub message: String,
    /// Truncated debug-format trace of the failure.
    pub trace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl StepErrorDetail {
    /// Max characters of debug trace retained per step record.
    pub const TRACE_MAX: usize = 600;

    pub fn from_error(err: &Error, context: Option<String>) -> Self {
        let mut trace = format!("{err:?}");
        if trace.len() > Self::TRACE_MAX {
            let mut cut = Self::TRACE_MAX;
            while !trace.is_char_boundary(cut) {
                cut -= 1;
            }
            trace.truncate(cut);
            trace.push_str("...");
        }
        Self {
            message: err.to_string(),
            trace,
            context,
        }
    }
}

/// Result type alias for the runtime.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_and_quota_variants_trigger_fallback() {
        let err = ModelError::PermissionDenied {
            model: "imagen-fast".to_string(),
            reason: "caller lacks access".to_string(),
        };
        assert!(err.is_permission_or_quota());

        let err = ModelError::QuotaExhausted {
            model: "imagen-fast".to_string(),
            reason: "daily limit".to_string(),
        };
        assert!(err.is_permission_or_quota());
    }

    #[test]
    fn permission_substring_in_generic_failure_triggers_fallback() {
        let err = ModelError::RequestFailed {
            model: "imagen-fast".to_string(),
            reason: "upstream said PERMISSION_DENIED for sizeHint".to_string(),
        };
        assert!(err.is_permission_or_quota());

        let err = ModelError::RequestFailed {
            model: "imagen-fast".to_string(),
            reason: "connection reset by peer".to_string(),
        };
        assert!(!err.is_permission_or_quota());
    }

    #[test]
    fn step_error_detail_truncates_trace() {
        let err = Error::Model(ModelError::RequestFailed {
            model: "m".to_string(),
            reason: "x".repeat(2000),
        });
        let detail = StepErrorDetail::from_error(&err, Some("structuring".to_string()));
        assert!(detail.trace.len() <= StepErrorDetail::TRACE_MAX + 3);
        assert!(detail.trace.ends_with("..."));
        assert_eq!(detail.context.as_deref(), Some("structuring"));
    }
}
