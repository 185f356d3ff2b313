//! WebSocket session plumbing.
//!
//! - [`connection`]: the outbound side of a socket behind [`connection::DuplexConnection`]
//! - [`handler`]: per-message pipeline (parse, validate, prompt, invoke)
//! - [`session`]: typed event loop and socket wiring

pub mod connection;
pub mod handler;
pub mod session;
