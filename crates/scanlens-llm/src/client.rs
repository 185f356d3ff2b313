//! # Inference Client Trait
//!
//! Narrow capability contract for the hosted model. The relay only ever asks
//! for a complete (non-streamed) answer and reads the `response` field of the
//! result.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Errors from an inference call.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Credentials were rejected.
    #[error("Auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// The service answered with an error status or `success: false`.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },

    /// Anything else.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl InferenceError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Self::Auth { message },
            _ => Self::Api { status, message },
        }
    }

    /// Short category string for structured logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) => "parse",
            Self::Auth { .. } => "auth",
            Self::Api { .. } => "api",
            Self::Other { .. } => "unknown",
        }
    }
}

/// Body of a text-generation call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InferenceRequest {
    /// Fully rendered prompt.
    pub prompt: String,
    /// Whether to stream tokens. The relay always sends `false`.
    pub stream: bool,
}

impl InferenceRequest {
    /// A request for a complete, non-streamed answer.
    pub fn complete(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            stream: false,
        }
    }
}

/// Raw result object returned by the model.
#[derive(Clone, Debug, PartialEq)]
pub struct InferenceResult(Value);

impl InferenceResult {
    /// Wrap a decoded result object.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The `response` text, or the JSON text of the whole result when the
    /// field is absent or not a string.
    pub fn response_text(&self) -> String {
        match self.0.get("response") {
            Some(Value::String(text)) => text.clone(),
            _ => self.0.to_string(),
        }
    }

    /// Borrow the underlying JSON.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Hosted model capability.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Backend identifier (e.g. `"workers-ai"`).
    fn name(&self) -> &str;

    /// Run `model` on `request` and return the complete result.
    async fn invoke(
        &self,
        model: &str,
        request: &InferenceRequest,
    ) -> Result<InferenceResult, InferenceError>;
}
