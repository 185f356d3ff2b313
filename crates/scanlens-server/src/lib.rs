//! # scanlens-server
//!
//! Axum server exposing the chat relay:
//!
//! - `GET /` informational text
//! - `/connect` WebSocket session (426 without an upgrade)
//! - `GET /health` liveness and session count
//!
//! Each WebSocket connection becomes a [`websocket::session::Session`] that
//! answers every inbound message with exactly one reply.

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use registry::SessionRegistry;
pub use server::{AppState, ScanlensServer};
pub use shutdown::ShutdownCoordinator;
