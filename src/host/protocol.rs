//! Wire protocol
//!
//! Request/response types for host-client communication, carried as
//! length-prefixed bincode frames. A connection must open with `Hello`
//! carrying the shared token; the two callable operations are `Query` and
//! `Insert`.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Upper bound on a single frame (prefix excluded)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Requests sent from client to host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Connection handshake; must be the first frame on every connection
    Hello { token: String },

    /// Ask the index a question
    Query { text: String },

    /// Load the document at `path` and insert it into the index
    Insert { path: String, doc_id: Option<String> },
}

/// Error codes carried in failure responses
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    Unauthorized,
    NotReady,
    QueryFailed,
    DocumentLoad,
    Persistence,
    InvalidRequest,
}

/// Responses sent from host to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    /// Handshake accepted
    HelloAck,

    /// Query answer
    Answer { text: String },

    /// Insert acknowledged
    Inserted { doc_id: String },

    /// Operation failed
    Error { code: ErrorCode, message: String },
}

impl Response {
    /// Create an error response
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    /// Create an unauthorized response
    pub fn unauthorized() -> Self {
        Self::error(ErrorCode::Unauthorized, "invalid or missing shared token")
    }
}

/// Encode a message to bytes with a u32 little-endian length prefix
pub fn encode_message<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    let payload = bincode::serialize(msg)?;
    if payload.len() > MAX_MESSAGE_SIZE {
        anyhow::bail!("Message too large: {} bytes", payload.len());
    }
    let len = (payload.len() as u32).to_le_bytes();
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&len);
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode a message from bytes (after the length prefix has been read)
pub fn decode_message<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(data)?)
}
