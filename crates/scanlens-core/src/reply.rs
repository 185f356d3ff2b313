//! Outbound frames.
//!
//! Successful answers go out as raw Markdown text. Failures go out as a JSON
//! object `{"error": ..}` with an optional `details` field.

use serde::{Deserialize, Serialize};

use crate::envelope::INVALID_PAYLOAD_MESSAGE;

/// Generic message for payloads that could not be processed at all.
pub const PROCESSING_ERROR_MESSAGE: &str = "Failed to process message.";

/// Message sent when the inference call fails.
pub const AI_SERVICE_ERROR_MESSAGE: &str = "AI service error";

/// JSON error object sent to the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    /// Human-readable error summary.
    pub error: String,
    /// Extra context, only present for upstream failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorReply {
    /// The payload could not be decoded or handling failed unexpectedly.
    pub fn processing() -> Self {
        Self {
            error: PROCESSING_ERROR_MESSAGE.into(),
            details: None,
        }
    }

    /// A required envelope field is missing or blank.
    pub fn invalid_payload() -> Self {
        Self {
            error: INVALID_PAYLOAD_MESSAGE.into(),
            details: None,
        }
    }

    /// The inference collaborator failed.
    pub fn ai_service(details: impl Into<String>) -> Self {
        Self {
            error: AI_SERVICE_ERROR_MESSAGE.into(),
            details: Some(details.into()),
        }
    }

    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            serde_json::json!({ "error": PROCESSING_ERROR_MESSAGE }).to_string()
        })
    }
}

/// One reply per inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Model answer, sent as-is.
    Text(String),
    /// Structured failure.
    Error(ErrorReply),
}

impl Reply {
    /// Whether this reply reports a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Render the text frame for the wire.
    pub fn into_frame(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Error(err) => err.to_json(),
        }
    }
}

impl From<ErrorReply> for Reply {
    fn from(err: ErrorReply) -> Self {
        Self::Error(err)
    }
}
