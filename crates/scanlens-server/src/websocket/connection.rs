//! Outbound half of a client connection.

use async_trait::async_trait;
use scanlens_core::SessionId;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Failure to hand a frame to the peer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The socket writer is gone (peer disconnected or session torn down).
    #[error("connection closed")]
    Closed,
    /// The socket rejected the write.
    #[error("socket write failed: {0}")]
    Socket(String),
}

/// One frame queued for the socket writer.
///
/// The writer resolves `ack` with the outcome of the actual socket write.
#[derive(Debug)]
pub struct Outbound {
    /// Text frame body.
    pub frame: String,
    /// Completion signal back to the sender.
    pub ack: oneshot::Sender<Result<(), TransportError>>,
}

/// Anything a session can write text frames to.
#[async_trait]
pub trait DuplexConnection: Send + Sync {
    /// Write one text frame to the peer.
    async fn send(&self, frame: String) -> Result<(), TransportError>;
}

/// Connection backed by the channel drained by the socket writer task.
///
/// `send` returns only after the writer reports back, so a peer that
/// disconnected mid-request surfaces as an error here.
pub struct ClientConnection {
    session_id: SessionId,
    tx: mpsc::Sender<Outbound>,
}

impl ClientConnection {
    /// Wrap the writer channel for `session_id`.
    pub fn new(session_id: SessionId, tx: mpsc::Sender<Outbound>) -> Self {
        Self { session_id, tx }
    }

    /// Owning session.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Whether the writer has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl DuplexConnection for ClientConnection {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Outbound { frame, ack })
            .await
            .map_err(|_| TransportError::Closed)?;
        // A writer that exits without answering never wrote the frame.
        done.await.unwrap_or(Err(TransportError::Closed))
    }
}
