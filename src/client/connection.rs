//! Host connection
//!
//! Connection establishment with bounded retry, the token handshake, and the
//! per-call request/response framing. Connection refusal is recoverable (the
//! host may simply not have bound its listener yet); every other connect
//! error class is treated as misconfiguration and fails immediately. Once
//! the retry budget is exhausted the failure is terminal: the client never
//! reconnects on its own.

use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::host::protocol::{
    decode_message, encode_message, Request, Response, MAX_MESSAGE_SIZE,
};

use super::ClientError;

/// Connection-establishment state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting { attempt: u32 },
    Connected,
    Failed,
}

/// Retry policy for connection establishment.
///
/// All timing is injected so tests can run the state machine with
/// millisecond values instead of wall-clock seconds.
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    /// Wait before the first attempt; gives a co-started host time to
    /// finish initializing and bind its listener
    pub grace: Duration,
    /// Maximum connection attempts
    pub attempts: u32,
    /// Fixed delay between attempts
    pub retry_interval: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(1),
            attempts: 20,
            retry_interval: Duration::from_secs(1),
        }
    }
}

/// Client connection to the index host
#[derive(Debug)]
pub struct HostClient {
    stream: TcpStream,
    state: ConnectionState,
}

impl HostClient {
    /// Connect to the host with bounded retry, then perform the token
    /// handshake.
    pub async fn connect(
        addr: &str,
        token: &str,
        options: ConnectOptions,
    ) -> Result<Self, ClientError> {
        let mut state = ConnectionState::Disconnected;
        debug!("Connecting to index host at: {}", addr);
        sleep(options.grace).await;

        for attempt in 1..=options.attempts {
            state = ConnectionState::Connecting { attempt };
            debug!("Connection state: {:?}", state);
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    debug!("Connected to {} on attempt {}", addr, attempt);
                    let mut client = Self {
                        stream,
                        state: ConnectionState::Connected,
                    };
                    client.handshake(token).await?;
                    info!("Connected to index host at: {}", addr);
                    return Ok(client);
                }
                Err(e) if is_recoverable(&e) => {
                    debug!(
                        "Host not ready (attempt {}/{}): {}",
                        attempt, options.attempts, e
                    );
                    if attempt < options.attempts {
                        sleep(options.retry_interval).await;
                    }
                }
                Err(e) => {
                    // Not a "host not up yet" condition; retrying would only
                    // mask a misconfigured endpoint
                    warn!("Fatal connect error to {}: {}", addr, e);
                    return Err(ClientError::Unreachable {
                        addr: addr.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        state = ConnectionState::Failed;
        warn!(
            "Exhausted {} connection attempts to {} (state: {:?})",
            options.attempts, addr, state
        );
        Err(ClientError::ConnectExhausted {
            attempts: options.attempts,
        })
    }

    async fn handshake(&mut self, token: &str) -> Result<(), ClientError> {
        let response = self
            .call(Request::Hello {
                token: token.to_string(),
            })
            .await?;
        match response {
            Response::HelloAck => Ok(()),
            Response::Error { code, message } => {
                self.state = ConnectionState::Failed;
                Err(ClientError::from_remote(code, message))
            }
            _ => {
                self.state = ConnectionState::Failed;
                Err(ClientError::UnexpectedResponse)
            }
        }
    }

    /// Forward a query and return the answer string
    pub async fn query(&mut self, text: &str) -> Result<String, ClientError> {
        let response = self
            .call(Request::Query {
                text: text.to_string(),
            })
            .await?;
        match response {
            Response::Answer { text } => Ok(text),
            Response::Error { code, message } => Err(ClientError::from_remote(code, message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Forward an insert for the document at `path`; returns the document id
    pub async fn insert_document(
        &mut self,
        path: &str,
        doc_id: Option<String>,
    ) -> Result<String, ClientError> {
        let response = self
            .call(Request::Insert {
                path: path.to_string(),
                doc_id,
            })
            .await?;
        match response {
            Response::Inserted { doc_id } => Ok(doc_id),
            Response::Error { code, message } => Err(ClientError::from_remote(code, message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Send one request frame and read one response frame. A transport
    /// failure marks the connection failed; later calls are refused instead
    /// of silently reconnecting.
    async fn call(&mut self, request: Request) -> Result<Response, ClientError> {
        if self.state == ConnectionState::Failed {
            return Err(ClientError::Transport(
                "connection is closed; restart the client".to_string(),
            ));
        }

        let result = self.exchange(request).await;
        if result.is_err() {
            self.state = ConnectionState::Failed;
        }
        result
    }

    async fn exchange(&mut self, request: Request) -> Result<Response, ClientError> {
        let encoded = encode_message(&request)
            .map_err(|e| ClientError::Transport(format!("failed to encode request: {e}")))?;

        self.stream
            .write_all(&encoded)
            .await
            .map_err(|e| ClientError::Transport(format!("failed to send request: {e}")))?;
        self.stream
            .flush()
            .await
            .map_err(|e| ClientError::Transport(format!("failed to flush: {e}")))?;

        let mut len_buf = [0u8; 4];
        self.stream
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| ClientError::Transport(format!("failed to read response length: {e}")))?;

        let msg_len = u32::from_le_bytes(len_buf) as usize;
        if msg_len > MAX_MESSAGE_SIZE {
            return Err(ClientError::Transport(format!(
                "response too large: {msg_len} bytes"
            )));
        }

        let mut payload = vec![0u8; msg_len];
        self.stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| ClientError::Transport(format!("failed to read response: {e}")))?;

        decode_message(&payload)
            .map_err(|e| ClientError::Transport(format!("failed to decode response: {e}")))
    }
}

/// Connection refusal means the host has not bound its listener yet
fn is_recoverable(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::NotFound
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::protocol;
    use std::time::Instant;
    use tokio::net::TcpListener;

    fn fast_options(attempts: u32) -> ConnectOptions {
        ConnectOptions {
            grace: Duration::from_millis(1),
            attempts,
            retry_interval: Duration::from_millis(25),
        }
    }

    /// Reserve a port that nothing is listening on
    fn unused_addr() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.to_string()
    }

    /// Minimal host side: accept one connection and answer the handshake
    async fn accept_handshake(listener: TcpListener, accept_token: &str) {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.unwrap();
        let mut payload = vec![0u8; u32::from_le_bytes(len_buf) as usize];
        stream.read_exact(&mut payload).await.unwrap();

        let request: Request = protocol::decode_message(&payload).unwrap();
        let response = match request {
            Request::Hello { token } if token == accept_token => Response::HelloAck,
            _ => Response::unauthorized(),
        };
        let encoded = protocol::encode_message(&response).unwrap();
        stream.write_all(&encoded).await.unwrap();
        stream.flush().await.unwrap();
    }

    #[tokio::test]
    async fn exhausts_retry_budget_against_unbound_port() {
        let addr = unused_addr();
        let options = fast_options(3);

        let started = Instant::now();
        let err = HostClient::connect(&addr, "secret", options)
            .await
            .unwrap_err();

        match err {
            ClientError::ConnectExhausted { attempts } => assert_eq!(attempts, 3),
            other => panic!("expected ConnectExhausted, got {other:?}"),
        }
        // Two inter-attempt delays must have elapsed
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn connects_when_host_binds_mid_retry() {
        let addr = unused_addr();
        let options = fast_options(20);

        let listener_addr = addr.clone();
        let server = tokio::spawn(async move {
            // Bind only after the client has burned a few attempts
            sleep(Duration::from_millis(80)).await;
            let listener = TcpListener::bind(&listener_addr).await.unwrap();
            accept_handshake(listener, "secret").await;
        });

        let client = HostClient::connect(&addr, "secret", options).await.unwrap();
        assert_eq!(client.state(), ConnectionState::Connected);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn bad_token_fails_without_retry() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            accept_handshake(listener, "right-token").await;
        });

        let err = HostClient::connect(&addr, "wrong-token", fast_options(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn calls_refused_after_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            // Handshake succeeds, then the host goes away
            accept_handshake(listener, "secret").await;
        });

        let mut client = HostClient::connect(&addr, "secret", fast_options(5))
            .await
            .unwrap();
        server.await.unwrap();

        let err = client.query("anything").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(client.state(), ConnectionState::Failed);

        // No auto-reconnect: the next call is refused immediately
        let err = client.query("anything").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}
