//! corpusd: Coordinated Document Index Service
//!
//! A single shared, mutable document index exposed to multiple independent
//! client processes through a remote-procedure boundary:
//! - Index host owning the handle behind one mutual-exclusion lock
//! - Durable index image, atomically replaced after every mutation
//! - Authenticated length-prefixed TCP protocol with exactly two operations
//! - Client-side connection establishment with bounded retry/backoff
//! - Thin HTTP gateway fronting the client's two calls

pub mod client;
pub mod config;
pub mod engine;
pub mod gateway;
pub mod host;
pub mod ingest;
pub mod types;

pub use config::Config;
pub use types::{Document, DocumentId};
