//! Index host
//!
//! The host owns the single mutable index resource and serves two remote
//! operations on it over an authenticated TCP protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                   corpusd host                    │
//! │                                                   │
//! │  ┌─────────────────────────────────────────────┐  │
//! │  │               Index Service                 │  │
//! │  │   ┌────────────┐      ┌─────────────────┐   │  │
//! │  │   │ IndexHandle│──────│   Image Store   │   │  │
//! │  │   │ (one lock) │      │ (atomic writes) │   │  │
//! │  │   └────────────┘      └─────────────────┘   │  │
//! │  └──────────────────────┬──────────────────────┘  │
//! │                         │                         │
//! │  ┌──────────────────────┴──────────────────────┐  │
//! │  │  RPC server (token handshake, TCP frames)   │  │
//! │  └─────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────┘
//! ```

pub mod handler;
pub mod lifecycle;
pub mod persistence;
pub mod protocol;
pub mod server;
pub mod service;

pub use handler::RequestHandler;
pub use lifecycle::{get_host_pid, is_host_running, Host};
pub use persistence::{ImageMeta, ImageStore};
pub use protocol::{decode_message, encode_message, ErrorCode, Request, Response};
pub use server::RpcServer;
pub use service::{IndexService, ServiceError, ServiceStats};
