//! # scanlens-core
//!
//! Pure building blocks shared by the relay server:
//!
//! - [`envelope`]: parsing and validation of the client `{question, scan_log}` envelope
//! - [`prompt`]: the deterministic prompt builder
//! - [`reply`]: outbound frame types (raw text on success, JSON error objects)
//! - [`ids`]: branded identifiers used for log correlation

#![deny(unsafe_code)]

pub mod envelope;
pub mod ids;
pub mod prompt;
pub mod reply;

pub use envelope::{Envelope, EnvelopeError};
pub use ids::SessionId;
pub use prompt::build_prompt;
pub use reply::{ErrorReply, Reply};
