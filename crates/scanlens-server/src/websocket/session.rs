//! WebSocket session lifecycle, from upgrade through close.
//!
//! A socket is split into three cooperating pieces:
//!
//! 1. a reader that turns frames into [`SessionEvent`]s,
//! 2. the [`Session`] loop that handles one event at a time, and
//! 3. a writer that drains the outbound channel into the socket and
//!    acknowledges each write.
//!
//! The session owns the only [`ClientConnection`], so when it finishes the
//! writer's channel closes and the writer exits.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{FutureExt, SinkExt, StreamExt};
use scanlens_core::{ErrorReply, Reply, SessionId};
use scanlens_llm::InferenceClient;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use super::connection::{ClientConnection, DuplexConnection, Outbound, TransportError};
use super::handler::handle_message;
use crate::server::AppState;

/// Everything the reader can observe on a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A text payload (or a binary frame that is valid UTF-8).
    Message(String),
    /// A binary frame that is not UTF-8.
    Undecodable,
    /// The peer closed the connection, or the server is shutting down.
    Close,
    /// The transport failed.
    Error(String),
}

/// Session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting messages.
    Open,
    /// Terminal.
    Closed,
}

/// One client's session.
pub struct Session<C> {
    id: SessionId,
    connection: C,
    inference: Arc<dyn InferenceClient>,
    model: Arc<str>,
    state: SessionState,
}

impl<C: DuplexConnection> Session<C> {
    /// New session in the [`SessionState::Open`] state.
    pub fn new(
        id: SessionId,
        connection: C,
        inference: Arc<dyn InferenceClient>,
        model: Arc<str>,
    ) -> Self {
        Self {
            id,
            connection,
            inference,
            model,
            state: SessionState::Open,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Apply one event and return the resulting state.
    ///
    /// Events that arrive after the session closed are ignored.
    pub async fn handle_event(&mut self, event: SessionEvent) -> SessionState {
        if self.state == SessionState::Closed {
            debug!(session_id = %self.id, "event after close ignored");
            return self.state;
        }

        match event {
            SessionEvent::Message(raw) => {
                let reply = self.process(&raw).await;
                self.deliver(reply).await;
            }
            SessionEvent::Undecodable => {
                debug!(session_id = %self.id, "binary frame is not UTF-8");
                self.deliver(ErrorReply::processing().into()).await;
            }
            SessionEvent::Close => {
                info!(session_id = %self.id, "session closed");
                self.state = SessionState::Closed;
            }
            SessionEvent::Error(reason) => {
                warn!(session_id = %self.id, %reason, "transport error, closing session");
                self.state = SessionState::Closed;
            }
        }
        self.state
    }

    /// Consume events until the session closes or the sender goes away.
    #[instrument(skip_all, fields(session_id = %self.id))]
    pub async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            if self.handle_event(event).await == SessionState::Closed {
                return;
            }
        }
        self.state = SessionState::Closed;
        debug!("event channel closed");
    }

    async fn process(&self, raw: &str) -> Reply {
        let pipeline = handle_message(raw, self.inference.as_ref(), &self.model);
        match AssertUnwindSafe(pipeline).catch_unwind().await {
            Ok(reply) => reply,
            Err(panic) => {
                error!(
                    session_id = %self.id,
                    panic = %panic_message(&panic),
                    "message handling panicked"
                );
                ErrorReply::processing().into()
            }
        }
    }

    async fn deliver(&self, reply: Reply) {
        let is_error = reply.is_error();
        match self.connection.send(reply.into_frame()).await {
            Ok(()) => debug!(session_id = %self.id, is_error, "reply sent"),
            Err(e) => warn!(session_id = %self.id, error = %e, "failed to send reply"),
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
        .to_string()
}

/// Serve an upgraded socket until it closes.
pub async fn serve_socket(socket: WebSocket, state: AppState) {
    let session_id = SessionId::new();
    let _guard = state.registry.register(session_id.clone());
    info!(session_id = %session_id, active = state.registry.len(), "session opened");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(state.queue_depth);
    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(state.queue_depth);

    let writer_id = session_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(Outbound { frame, ack }) = out_rx.recv().await {
            let result = ws_tx
                .send(Message::Text(frame.into()))
                .await
                .map_err(|e| TransportError::Socket(e.to_string()));
            let failed = result.is_err();
            let _ = ack.send(result);
            if failed {
                break;
            }
        }
        if let Err(e) = ws_tx.close().await {
            debug!(session_id = %writer_id, error = %e, "socket close failed");
        }
    });

    let session = Session::new(
        session_id.clone(),
        ClientConnection::new(session_id.clone(), out_tx),
        Arc::clone(&state.inference),
        Arc::clone(&state.model),
    );
    let session_task = tokio::spawn(session.run(event_rx));

    let shutdown = state.shutdown.token();
    loop {
        let event = tokio::select! {
            () = shutdown.cancelled() => SessionEvent::Close,
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => SessionEvent::Message(text.to_string()),
                Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => SessionEvent::Message(text.to_owned()),
                    Err(_) => SessionEvent::Undecodable,
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => SessionEvent::Close,
                Some(Err(e)) => SessionEvent::Error(e.to_string()),
            },
        };
        let terminal = matches!(event, SessionEvent::Close | SessionEvent::Error(_));
        if event_tx.send(event).await.is_err() || terminal {
            break;
        }
    }
    drop(event_tx);

    if let Err(e) = session_task.await {
        error!(session_id = %session_id, error = %e, "session task failed");
    }
    if let Err(e) = writer.await {
        error!(session_id = %session_id, error = %e, "writer task failed");
    }
    info!(session_id = %session_id, "session ended");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use scanlens_core::reply::PROCESSING_ERROR_MESSAGE;
    use scanlens_llm::{MockInferenceClient, MockResponse};
    use scanlens_logging::capture_logs;
    use serde_json::{Value, json};
    use tracing::Level;

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingConnection {
        frames: Arc<Mutex<Vec<String>>>,
        closed: bool,
    }

    impl RecordingConnection {
        fn closed() -> Self {
            Self {
                closed: true,
                ..Self::default()
            }
        }

        fn frames(&self) -> Vec<String> {
            self.frames.lock().clone()
        }
    }

    #[async_trait]
    impl DuplexConnection for RecordingConnection {
        async fn send(&self, frame: String) -> Result<(), TransportError> {
            if self.closed {
                return Err(TransportError::Closed);
            }
            self.frames.lock().push(frame);
            Ok(())
        }
    }

    fn session(
        conn: RecordingConnection,
        responses: Vec<MockResponse>,
    ) -> (Session<RecordingConnection>, Arc<MockInferenceClient>) {
        let mock = Arc::new(MockInferenceClient::new(responses));
        let s = Session::new(
            SessionId::from_raw("sess_test"),
            conn,
            mock.clone(),
            Arc::from("@cf/test"),
        );
        (s, mock)
    }

    fn valid() -> SessionEvent {
        SessionEvent::Message(
            json!({
                "question": "What is the most critical risk?",
                "scan_log": "Host: 198.51.100.42\nPorts: 22/tcp open ssh\n",
            })
            .to_string(),
        )
    }

    fn parse(frame: &str) -> Value {
        serde_json::from_str(frame).unwrap()
    }

    #[tokio::test]
    async fn starts_open() {
        let (s, _) = session(RecordingConnection::default(), vec![]);
        assert_eq!(s.state(), SessionState::Open);
        assert_eq!(s.id().as_str(), "sess_test");
    }

    #[tokio::test]
    async fn one_reply_per_message() {
        let conn = RecordingConnection::default();
        let (mut s, mock) = session(conn.clone(), vec![MockResponse::text("## Most Critical Risk\n...")]);

        assert_eq!(s.handle_event(valid()).await, SessionState::Open);
        assert_eq!(conn.frames(), vec!["## Most Critical Risk\n...".to_string()]);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn error_then_recovery() {
        let conn = RecordingConnection::default();
        let (mut s, mock) = session(
            conn.clone(),
            vec![MockResponse::failure("boom"), MockResponse::text("fine")],
        );

        let _ = s.handle_event(valid()).await;
        let _ = s.handle_event(valid()).await;

        let frames = conn.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(parse(&frames[0])["error"], "AI service error");
        assert_eq!(frames[1], "fine");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn undecodable_binary_gets_processing_error() {
        let conn = RecordingConnection::default();
        let (mut s, mock) = session(conn.clone(), vec![]);

        assert_eq!(s.handle_event(SessionEvent::Undecodable).await, SessionState::Open);
        assert_eq!(
            parse(&conn.frames()[0]),
            json!({"error": PROCESSING_ERROR_MESSAGE})
        );
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn panic_is_caught_and_session_survives() {
        let conn = RecordingConnection::default();
        let (mut s, _) = session(
            conn.clone(),
            vec![MockResponse::Panic("kaboom".into()), MockResponse::text("after")],
        );

        assert_eq!(s.handle_event(valid()).await, SessionState::Open);
        assert_eq!(s.handle_event(valid()).await, SessionState::Open);

        let frames = conn.frames();
        assert_eq!(parse(&frames[0]), json!({"error": PROCESSING_ERROR_MESSAGE}));
        assert_eq!(frames[1], "after");
    }

    #[tokio::test]
    async fn close_is_terminal() {
        let conn = RecordingConnection::default();
        let (mut s, mock) = session(conn.clone(), vec![MockResponse::text("never")]);

        assert_eq!(s.handle_event(SessionEvent::Close).await, SessionState::Closed);
        assert_eq!(s.handle_event(valid()).await, SessionState::Closed);
        assert!(conn.frames().is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn transport_error_closes() {
        let (mut s, _) = session(RecordingConnection::default(), vec![]);
        let state = s.handle_event(SessionEvent::Error("reset by peer".into())).await;
        assert_eq!(state, SessionState::Closed);
    }

    #[tokio::test]
    async fn send_failure_is_logged_not_propagated() {
        let (logs, _guard) = capture_logs();
        let (mut s, mock) = session(RecordingConnection::closed(), vec![MockResponse::text("lost")]);

        assert_eq!(s.handle_event(valid()).await, SessionState::Open);
        assert_eq!(mock.call_count(), 1);
        assert!(logs.has_event(Level::WARN, "failed to send reply"));
    }

    #[tokio::test]
    async fn run_processes_in_order_until_close() {
        let conn = RecordingConnection::default();
        let (s, mock) = session(
            conn.clone(),
            vec![MockResponse::text("one"), MockResponse::text("two")],
        );
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(s.run(rx));

        tx.send(valid()).await.unwrap();
        tx.send(SessionEvent::Message("nope".into())).await.unwrap();
        tx.send(valid()).await.unwrap();
        tx.send(SessionEvent::Close).await.unwrap();
        let _ = tx.send(valid()).await;

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        let frames = conn.frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], "one");
        assert_eq!(parse(&frames[1])["error"], PROCESSING_ERROR_MESSAGE);
        assert_eq!(frames[2], "two");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn run_ends_when_sender_dropped() {
        let (s, _) = session(RecordingConnection::default(), vec![]);
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), s.run(rx))
            .await
            .unwrap();
    }

    #[test]
    fn panic_message_variants() {
        let s: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&s), "owned");
        let s: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(&s), "static");
        let s: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&s), "unknown panic");
    }
}
