//! RPC server
//!
//! TCP listener for host-client communication. Every connection must open
//! with a `Hello` frame carrying the shared token; nothing else is reachable
//! before the handshake succeeds. Requests on one connection are processed
//! strictly in order; the index service's lock serializes operations across
//! all connections.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::handler::RequestHandler;
use super::protocol::{decode_message, encode_message, ErrorCode, Request, Response, MAX_MESSAGE_SIZE};

/// RPC server bound to a fixed host:port
pub struct RpcServer {
    listen_addr: SocketAddr,
    token: String,
    handler: Arc<RequestHandler>,
}

impl RpcServer {
    pub fn new(listen_addr: SocketAddr, token: String, handler: Arc<RequestHandler>) -> Self {
        Self {
            listen_addr,
            token,
            handler,
        }
    }

    /// Run the server until the shutdown channel fires
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let listener = TcpListener::bind(self.listen_addr)
            .await
            .with_context(|| format!("failed to bind RPC listener on {}", self.listen_addr))?;

        info!("RPC server listening on: {}", self.listen_addr);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            debug!("New client connection from: {}", peer);
                            let handler = self.handler.clone();
                            let token = self.token.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, handler, token).await {
                                    warn!("Connection error ({}): {}", peer, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("RPC server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Address the server binds to
    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }
}

/// Handle a single client connection: handshake first, then request frames
/// in order until the peer disconnects.
async fn handle_connection(
    mut stream: TcpStream,
    handler: Arc<RequestHandler>,
    token: String,
) -> Result<()> {
    match read_frame::<Request>(&mut stream).await? {
        None => return Ok(()),
        Some(Request::Hello { token: offered }) if offered == token => {
            send_response(&mut stream, &Response::HelloAck).await?;
        }
        Some(Request::Hello { .. }) => {
            warn!("Rejected connection with invalid token");
            send_response(&mut stream, &Response::unauthorized()).await?;
            return Ok(());
        }
        Some(_) => {
            send_response(
                &mut stream,
                &Response::error(ErrorCode::Unauthorized, "handshake required"),
            )
            .await?;
            return Ok(());
        }
    }

    loop {
        let request = match read_frame::<Request>(&mut stream).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!("Client disconnected");
                return Ok(());
            }
            Err(e) => {
                // Malformed or oversized frame: report, then drop the
                // connection rather than guessing at the stream position
                let response =
                    Response::error(ErrorCode::InvalidRequest, format!("bad request frame: {e}"));
                let _ = send_response(&mut stream, &response).await;
                return Err(e);
            }
        };

        let response = handler.handle(request).await;
        send_response(&mut stream, &response).await?;
    }
}

/// Read one length-prefixed frame; None means the peer closed cleanly
async fn read_frame<T: for<'de> serde::Deserialize<'de>>(
    stream: &mut TcpStream,
) -> Result<Option<T>> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let msg_len = u32::from_le_bytes(len_buf) as usize;
    if msg_len > MAX_MESSAGE_SIZE {
        anyhow::bail!("frame too large: {} bytes", msg_len);
    }

    let mut payload = vec![0u8; msg_len];
    stream.read_exact(&mut payload).await?;
    Ok(Some(decode_message(&payload)?))
}

async fn send_response(stream: &mut TcpStream, response: &Response) -> Result<()> {
    let encoded = encode_message(response)?;
    stream.write_all(&encoded).await?;
    stream.flush().await?;
    Ok(())
}
