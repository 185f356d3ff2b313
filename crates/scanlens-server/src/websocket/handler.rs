//! Per-message pipeline.

use scanlens_core::{Envelope, EnvelopeError, ErrorReply, Reply, build_prompt};
use scanlens_llm::{InferenceClient, InferenceRequest};
use tracing::{debug, warn};

/// Turn one raw inbound payload into exactly one reply.
///
/// Malformed JSON and missing fields are answered without calling the model.
pub async fn handle_message(raw: &str, inference: &dyn InferenceClient, model: &str) -> Reply {
    let envelope = match Envelope::parse(raw) {
        Ok(envelope) => envelope,
        Err(EnvelopeError::Malformed(reason)) => {
            debug!(%reason, "payload is not JSON");
            return ErrorReply::processing().into();
        }
        Err(EnvelopeError::MissingField) => {
            debug!("payload missing question or scan_log");
            return ErrorReply::invalid_payload().into();
        }
    };

    let prompt = build_prompt(envelope.question(), Some(envelope.scan_log()));
    let request = InferenceRequest::complete(prompt);
    debug!(
        model,
        backend = inference.name(),
        prompt_len = request.prompt.len(),
        "invoking model"
    );

    match inference.invoke(model, &request).await {
        Ok(result) => Reply::Text(result.response_text()),
        Err(e) => {
            warn!(model, category = e.category(), error = %e, "inference call failed");
            ErrorReply::ai_service(e.to_string()).into()
        }
    }
}
