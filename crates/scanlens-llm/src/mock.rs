//! Scripted inference client for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::client::{InferenceClient, InferenceError, InferenceRequest, InferenceResult};

/// Pre-programmed outcomes for deterministic tests without network calls.
pub enum MockResponse {
    /// Succeed with `{"response": text}`.
    Text(String),
    /// Succeed with an arbitrary result object.
    Raw(Value),
    /// Fail with the given error.
    Error(InferenceError),
    /// Panic inside the call.
    Panic(String),
    /// Wait, then produce the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    /// Convenience: successful text answer.
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_owned())
    }

    /// Convenience: upstream failure with a plain message.
    pub fn failure(message: &str) -> Self {
        Self::Error(InferenceError::Other {
            message: message.to_owned(),
        })
    }

    /// Convenience: wrap any response with a delay.
    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Client that replays scripted responses in order and records every call.
pub struct MockInferenceClient {
    responses: Mutex<VecDeque<MockResponse>>,
    calls: Mutex<Vec<(String, InferenceRequest)>>,
    call_count: AtomicUsize,
}

impl MockInferenceClient {
    /// Script the responses for successive calls.
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Number of `invoke` calls made so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// `(model, request)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, InferenceRequest)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(
        &self,
        model: &str,
        request: &InferenceRequest,
    ) -> Result<InferenceResult, InferenceError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.calls.lock().push((model.to_owned(), request.clone()));

        let Some(mut response) = self.responses.lock().pop_front() else {
            return Err(InferenceError::Other {
                message: format!("MockInferenceClient: no response configured for call {idx}"),
            });
        };

        loop {
            match response {
                MockResponse::Text(text) => {
                    return Ok(InferenceResult::new(json!({ "response": text })));
                }
                MockResponse::Raw(value) => return Ok(InferenceResult::new(value)),
                MockResponse::Error(err) => return Err(err),
                MockResponse::Panic(msg) => panic!("{msg}"),
                MockResponse::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    response = *inner;
                }
            }
        }
    }
}
