//! Core library for the postbrand content pipeline, job queue, and
//! UCB-bandit scheduler.
//!
//! This crate contains the business logic shared by the CLI and server
//! binaries: configuration management, error types, durable storage,
//! the job queue runtime, and the workflow modules that drive a post
//! from draft through publication.
pub mod chat;
pub mod config;
pub mod error;
pub mod insights;
pub mod llm;
pub mod net;
pub mod pipeline;
pub mod publisher;
pub mod queue;
pub mod redact;
pub mod review;
pub mod runtime;
pub mod scheduler;
pub mod similarity;
pub mod social;
pub mod store;
pub mod token_lifecycle;
pub mod ucb;

pub use error::*;

/// Returns the version of the postbrand-core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
