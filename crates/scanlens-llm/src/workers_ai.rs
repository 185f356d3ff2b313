//! Cloudflare Workers AI over the public REST API.
//!
//! `POST {base_url}/accounts/{account_id}/ai/run/{model}` with a bearer token.
//! The service wraps every answer in an envelope:
//!
//! ```json
//! { "success": true, "result": { "response": "..." }, "errors": [], "messages": [] }
//! ```
//!
//! [`WorkersAiClient`] unwraps `result` into an [`InferenceResult`] and maps
//! error statuses and `success: false` to [`InferenceError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::client::{InferenceClient, InferenceError, InferenceRequest, InferenceResult};

/// Public API root.
pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "@cf/meta/llama-3-8b-instruct";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`WorkersAiClient`].
pub struct WorkersAiConfig {
    /// API root, without a trailing `/accounts/...` segment.
    pub base_url: String,
    /// Cloudflare account that owns the AI binding.
    pub account_id: String,
    /// API token with Workers AI read permission.
    pub api_token: SecretString,
    /// TCP connect timeout. No overall request timeout is applied.
    pub connect_timeout: Duration,
}

impl WorkersAiConfig {
    /// Config against the public API with default timeouts.
    pub fn new(account_id: impl Into<String>, api_token: SecretString) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            account_id: account_id.into(),
            api_token,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the API root (used to point at a mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for WorkersAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkersAiConfig")
            .field("base_url", &self.base_url)
            .field("account_id", &self.account_id)
            .field("api_token", &"[REDACTED]")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Response envelope used by every Cloudflare v4 endpoint.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

fn default_success() -> bool {
    true
}

/// Workers AI text-generation client.
pub struct WorkersAiClient {
    client: Client,
    config: WorkersAiConfig,
}

impl WorkersAiClient {
    /// Build the HTTP client.
    pub fn new(config: WorkersAiConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Full run URL for a model identifier such as `@cf/meta/llama-3-8b-instruct`.
    pub fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.account_id,
            model.trim_start_matches('/'),
        )
    }
}

#[async_trait]
impl InferenceClient for WorkersAiClient {
    fn name(&self) -> &str {
        "workers-ai"
    }

    #[instrument(skip(self, request), fields(model = %model, prompt_len = request.prompt.len()))]
    async fn invoke(
        &self,
        model: &str,
        request: &InferenceRequest,
    ) -> Result<InferenceResult, InferenceError> {
        let resp = self
            .client
            .post(self.endpoint(model))
            .bearer_auth(self.config.api_token.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;

        if !(200..300).contains(&status) {
            warn!(status, "workers ai returned error status");
            return Err(InferenceError::from_status(status, error_message(&body)));
        }

        let envelope: ApiEnvelope = serde_json::from_str(&body)?;
        if !envelope.success {
            return Err(InferenceError::Api {
                status,
                message: join_errors(&envelope.errors),
            });
        }

        debug!(status, "workers ai call succeeded");
        Ok(InferenceResult::new(envelope.result.unwrap_or(Value::Null)))
    }
}

/// Best-effort message from an error body: the envelope's `errors` if it
/// parses, the raw body otherwise.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiEnvelope>(body) {
        Ok(envelope) if !envelope.errors.is_empty() => join_errors(&envelope.errors),
        _ => body.to_owned(),
    }
}

fn join_errors(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "request was not successful".into();
    }
    errors
        .iter()
        .map(|e| match e.code {
            Some(code) => format!("{code}: {}", e.message),
            None => e.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
