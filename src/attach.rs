//! File attachments for the document-analysis flow.
//!
//! Uploads arrive as base64 with a data-URI prefix. The core strips the
//! prefix and validates the payload before anything crosses the model
//! boundary; oversized or undecodable attachments never start a run.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::AttachmentError;

/// Hard cap on decoded attachment size.
pub const MAX_ATTACHMENT_BYTES: usize = 20 * 1024 * 1024;

/// One uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileAttachment {
    pub name: String,
    pub mime_type: String,
    /// Base64 payload, with or without a `data:<mime>;base64,` prefix.
    pub data: String,
}

impl FileAttachment {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// The payload with any data-URI prefix stripped.
    pub fn raw_base64(&self) -> &str {
        match self.data.strip_prefix("data:") {
            Some(rest) => match rest.split_once(";base64,") {
                Some((_, payload)) => payload,
                None => &self.data,
            },
            None => &self.data,
        }
    }

    /// File name without its final extension, used as a fallback deal name.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    /// Validate decodability and size; returns the decoded byte count.
    pub fn validate(&self) -> Result<usize, AttachmentError> {
        self.validate_with_limit(MAX_ATTACHMENT_BYTES)
    }

    fn validate_with_limit(&self, max: usize) -> Result<usize, AttachmentError> {
        let payload = self.raw_base64();
        if payload.trim().is_empty() {
            return Err(AttachmentError::EmptyPayload {
                name: self.name.clone(),
            });
        }
        let decoded = STANDARD
            .decode(payload.trim())
            .map_err(|e| AttachmentError::InvalidBase64 {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;
        if decoded.len() > max {
            return Err(AttachmentError::TooLarge {
                name: self.name.clone(),
                size: decoded.len(),
                max,
            });
        }
        Ok(decoded.len())
    }
}
