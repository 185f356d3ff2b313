//! `/health` endpoint body.

use std::time::Instant;

use serde::Serialize;

/// Liveness snapshot served on `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while the listener is up.
    pub status: &'static str,
    /// Whole seconds since [`crate::ScanlensServer`] was built.
    pub uptime_secs: u64,
    /// Sessions currently held in the registry.
    pub active_sessions: usize,
}

/// Snapshot the relay's counters.
pub fn health_check(start_time: Instant, sessions: usize) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        active_sessions: sessions,
    }
}
