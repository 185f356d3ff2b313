//! Client envelope parsing and validation.
//!
//! A client sends one JSON object per message:
//!
//! ```json
//! { "question": "What is the most critical risk?", "scan_log": "Host: ..." }
//! ```
//!
//! Field values are coerced to strings: a missing or `null` field becomes the
//! empty string, strings are taken as-is, and any other JSON value is rendered
//! as its JSON text. Both fields must be non-empty after trimming.

use serde_json::Value;
use thiserror::Error;

/// Message sent to the peer when a required field is missing or blank.
pub const INVALID_PAYLOAD_MESSAGE: &str =
    "Invalid payload. 'question' and 'scan_log' are required.";

/// Reasons an inbound message cannot be turned into an [`Envelope`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The payload is not valid JSON.
    #[error("malformed JSON: {0}")]
    Malformed(String),
    /// `question` or `scan_log` is missing or blank.
    #[error("{}", INVALID_PAYLOAD_MESSAGE)]
    MissingField,
}

/// A validated client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    question: String,
    scan_log: String,
}

impl Envelope {
    /// Parse and validate a raw text payload.
    pub fn parse(raw: &str) -> Result<Self, EnvelopeError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Validate an already-decoded JSON value.
    ///
    /// Non-object values carry no fields and are rejected as
    /// [`EnvelopeError::MissingField`].
    pub fn from_value(value: &Value) -> Result<Self, EnvelopeError> {
        let question = coerce_field(value, "question").trim().to_owned();
        let scan_log = coerce_field(value, "scan_log");

        if question.is_empty() || scan_log.trim().is_empty() {
            return Err(EnvelopeError::MissingField);
        }

        Ok(Self { question, scan_log })
    }

    /// The trimmed question.
    pub fn question(&self) -> &str {
        &self.question
    }

    /// The log body exactly as the client sent it.
    pub fn scan_log(&self) -> &str {
        &self.scan_log
    }
}

fn coerce_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_valid_envelope() {
        let env = Envelope::parse(r#"{"question":"What is open?","scan_log":"22/tcp open"}"#)
            .unwrap();
        assert_eq!(env.question(), "What is open?");
        assert_eq!(env.scan_log(), "22/tcp open");
    }

    #[test]
    fn question_is_trimmed() {
        let env = Envelope::parse(r#"{"question":"  hi \n","scan_log":"x"}"#).unwrap();
        assert_eq!(env.question(), "hi");
    }

    #[test]
    fn scan_log_is_kept_verbatim() {
        let env = Envelope::parse(r#"{"question":"q","scan_log":"  line1\nline2\n  "}"#).unwrap();
        assert_eq!(env.scan_log(), "  line1\nline2\n  ");
    }

    #[test]
    fn non_json_is_malformed() {
        let err = Envelope::parse("not json at all").unwrap_err();
        assert!(matches!(err, EnvelopeError::Malformed(_)));
    }

    #[test]
    fn empty_payload_is_malformed() {
        assert!(matches!(Envelope::parse(""), Err(EnvelopeError::Malformed(_))));
    }

    #[test]
    fn empty_question_rejected() {
        let err = Envelope::parse(r#"{"question":"","scan_log":"x"}"#).unwrap_err();
        assert_eq!(err, EnvelopeError::MissingField);
    }

    #[test]
    fn blank_log_rejected() {
        let err = Envelope::parse(r#"{"question":"q","scan_log":"   \n"}"#).unwrap_err();
        assert_eq!(err, EnvelopeError::MissingField);
    }

    #[test]
    fn missing_fields_rejected() {
        assert_eq!(
            Envelope::parse(r#"{"question":"q"}"#).unwrap_err(),
            EnvelopeError::MissingField
        );
        assert_eq!(
            Envelope::parse(r#"{"scan_log":"x"}"#).unwrap_err(),
            EnvelopeError::MissingField
        );
    }

    #[test]
    fn null_fields_rejected() {
        let err = Envelope::parse(r#"{"question":null,"scan_log":"x"}"#).unwrap_err();
        assert_eq!(err, EnvelopeError::MissingField);
    }

    #[test]
    fn non_object_json_rejected() {
        assert_eq!(Envelope::parse("[1,2,3]").unwrap_err(), EnvelopeError::MissingField);
        assert_eq!(Envelope::parse("\"text\"").unwrap_err(), EnvelopeError::MissingField);
        assert_eq!(Envelope::parse("null").unwrap_err(), EnvelopeError::MissingField);
    }

    #[test]
    fn scalar_values_are_coerced() {
        let env = Envelope::from_value(&json!({"question": 42, "scan_log": true})).unwrap();
        assert_eq!(env.question(), "42");
        assert_eq!(env.scan_log(), "true");
    }

    #[test]
    fn structured_log_is_rendered_as_json() {
        let env = Envelope::from_value(&json!({
            "question": "q",
            "scan_log": {"host": "198.51.100.42"}
        }))
        .unwrap();
        assert_eq!(env.scan_log(), r#"{"host":"198.51.100.42"}"#);
    }

    #[test]
    fn missing_field_display_matches_wire_message() {
        assert_eq!(EnvelopeError::MissingField.to_string(), INVALID_PAYLOAD_MESSAGE);
    }
}
