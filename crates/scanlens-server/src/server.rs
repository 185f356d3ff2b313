//! `ScanlensServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{any, get};
use scanlens_llm::InferenceClient;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::registry::SessionRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::serve_socket;

/// Body of `/`.
pub const INDEX_TEXT: &str = "scanlens security scan assistant. \
Open a WebSocket to /connect and send {\"question\": ..., \"scan_log\": ...}.";

/// Body of the 426 response on `/connect`.
pub const UPGRADE_REQUIRED_TEXT: &str = "Expected Upgrade: websocket";

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Model backend shared by every session.
    pub inference: Arc<dyn InferenceClient>,
    /// Open sessions.
    pub registry: Arc<SessionRegistry>,
    /// Model identifier.
    pub model: Arc<str>,
    /// Per-session channel capacity.
    pub queue_depth: usize,
    /// When the server started.
    pub start_time: Instant,
    /// Shutdown signal.
    pub shutdown: Arc<ShutdownCoordinator>,
}

/// The relay server.
pub struct ScanlensServer {
    config: ServerConfig,
    state: AppState,
}

impl ScanlensServer {
    /// Create a server with a fresh session registry.
    pub fn new(config: ServerConfig, inference: Arc<dyn InferenceClient>) -> Self {
        Self::with_registry(config, inference, Arc::new(SessionRegistry::new()))
    }

    /// Create a server around an existing session registry.
    pub fn with_registry(
        config: ServerConfig,
        inference: Arc<dyn InferenceClient>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        let state = AppState {
            inference,
            registry,
            model: Arc::from(config.model.as_str()),
            queue_depth: config.queue_depth.max(1),
            start_time: Instant::now(),
            shutdown: Arc::new(ShutdownCoordinator::new()),
        };
        Self { config, state }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", any(index_handler))
            .route("/health", get(health_handler))
            .route("/connect", any(connect_handler))
            .fallback(not_found)
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve in the background until shutdown fires.
    ///
    /// Returns the bound address and the serving task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.state.shutdown.token();

        info!(%addr, model = %self.state.model, "scanlens server listening");

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await;
            if let Err(e) = result {
                error!(error = %e, "server stopped with error");
            }
        });

        Ok((addr, handle))
    }

    /// Session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.state.registry
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// / (any method)
async fn index_handler() -> &'static str {
    INDEX_TEXT
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, state.registry.len()))
}

/// /connect: upgrade to a session, or 426.
async fn connect_handler(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(ws) => ws
            .on_upgrade(move |socket| serve_socket(socket, state))
            .into_response(),
        Err(rejection) => {
            debug!(%rejection, "request to /connect without websocket upgrade");
            (StatusCode::UPGRADE_REQUIRED, UPGRADE_REQUIRED_TEXT).into_response()
        }
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use scanlens_llm::MockInferenceClient;
    use tower::ServiceExt;

    fn make_server() -> ScanlensServer {
        ScanlensServer::new(
            ServerConfig::default(),
            Arc::new(MockInferenceClient::new(vec![])),
        )
    }

    async fn body_string(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn index_returns_text() {
        let resp = make_server()
            .router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_string(resp).await.contains("/connect"));
    }

    #[tokio::test]
    async fn index_ignores_method() {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let resp = make_server().router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, INDEX_TEXT);
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let resp = make_server()
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let parsed: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["active_sessions"], 0);
        assert!(parsed["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn health_counts_registered_sessions() {
        let server = make_server();
        let _guard = server.registry().register(scanlens_core::SessionId::new());
        let resp = server
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(parsed["active_sessions"], 1);
    }

    #[tokio::test]
    async fn connect_without_upgrade_is_426() {
        let resp = make_server()
            .router()
            .oneshot(Request::builder().uri("/connect").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UPGRADE_REQUIRED);
        assert_eq!(body_string(resp).await, UPGRADE_REQUIRED_TEXT);
    }

    #[tokio::test]
    async fn connect_with_post_is_426() {
        let req = Request::builder()
            .method("POST")
            .uri("/connect")
            .body(Body::from("{}"))
            .unwrap();
        let resp = make_server().router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UPGRADE_REQUIRED);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let resp = make_server()
            .router()
            .oneshot(Request::builder().uri("/nonexistent").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn registry_is_injected() {
        let registry = Arc::new(SessionRegistry::new());
        let server = ScanlensServer::with_registry(
            ServerConfig::default(),
            Arc::new(MockInferenceClient::new(vec![])),
            registry.clone(),
        );
        let _guard = registry.register(scanlens_core::SessionId::new());
        assert_eq!(server.registry().len(), 1);
    }

    #[test]
    fn shutdown_coordinator_accessible() {
        let server = make_server();
        assert!(!server.shutdown().is_shutting_down());
        assert_eq!(server.config().port, 0);
    }

    #[tokio::test]
    async fn listen_binds_and_stops_on_shutdown() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert!(
            server
                .shutdown()
                .drain(handle, Some(std::time::Duration::from_secs(5)))
                .await
        );
    }
}
