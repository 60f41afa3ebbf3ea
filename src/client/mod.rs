//! Coordination client
//!
//! Runs inside a front-end process, establishes an authenticated connection
//! to the index host (tolerating the host starting later), and forwards the
//! two index operations as remote calls.

pub mod connection;

pub use connection::{ConnectOptions, ConnectionState, HostClient};

use thiserror::Error;

use crate::host::protocol::ErrorCode;

/// Errors surfaced by the client to its caller
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("host rejected the shared token")]
    Unauthorized,

    #[error("cannot reach index host at {addr}: {reason}")]
    Unreachable { addr: String, reason: String },

    #[error("gave up connecting to the index host after {attempts} attempts")]
    ConnectExhausted { attempts: u32 },

    #[error("index is not ready; insert a document first")]
    NotReady,

    #[error("{message}")]
    Remote { code: ErrorCode, message: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("unexpected response from host")]
    UnexpectedResponse,
}

impl ClientError {
    /// Map a wire-level error response onto a client error
    pub(crate) fn from_remote(code: ErrorCode, message: String) -> Self {
        match code {
            ErrorCode::NotReady => ClientError::NotReady,
            ErrorCode::Unauthorized => ClientError::Unauthorized,
            _ => ClientError::Remote { code, message },
        }
    }
}
