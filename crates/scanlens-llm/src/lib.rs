//! # scanlens-llm
//!
//! The inference collaborator seen by the relay: a single non-streaming
//! "prompt in, result out" call behind the [`InferenceClient`] trait.
//!
//! - [`client`]: trait, request/result types, and [`InferenceError`]
//! - [`workers_ai`]: Cloudflare Workers AI REST implementation
//! - [`mock`]: scripted client for tests

#![deny(unsafe_code)]

pub mod client;
pub mod mock;
pub mod workers_ai;

pub use client::{InferenceClient, InferenceError, InferenceRequest, InferenceResult};
pub use mock::{MockInferenceClient, MockResponse};
pub use workers_ai::{DEFAULT_BASE_URL, DEFAULT_MODEL, WorkersAiClient, WorkersAiConfig};
