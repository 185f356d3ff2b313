//! Server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for [`crate::ScanlensServer`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Model identifier passed to the inference client.
    pub model: String,
    /// Per-session queue depth for inbound events and outbound frames.
    pub queue_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            model: scanlens_llm::DEFAULT_MODEL.into(),
            queue_depth: 64,
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
