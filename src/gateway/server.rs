//! Gateway HTTP server
//!
//! Axum front-end for the coordination client. The client connection is
//! established (with its retry budget) before this server starts; a gateway
//! without a working host connection never serves.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::Method;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::client::HostClient;
use crate::config::GatewayConfig;

use super::handlers::AppState;
use super::routes::create_router;

/// HTTP gateway server
pub struct GatewayServer {
    config: GatewayConfig,
    client: Arc<Mutex<HostClient>>,
}

impl GatewayServer {
    /// Create a gateway over an already-connected client
    pub fn new(config: GatewayConfig, client: HostClient) -> Self {
        Self {
            config,
            client: Arc::new(Mutex::new(client)),
        }
    }

    /// Run the gateway until the shutdown channel fires
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .context("invalid gateway listen address")?;

        let app_state = AppState {
            client: self.client.clone(),
            upload_dir: self.config.upload_dir.clone(),
        };

        let mut app = create_router(app_state);

        if self.config.cors_enabled {
            let cors = CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any)
                .allow_origin(Any);
            app = app.layer(cors);
        }

        app = app.layer(TraceLayer::new_for_http());

        let listener = TcpListener::bind(&addr)
            .await
            .context("failed to bind gateway listener")?;

        info!("Gateway listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                info!("Gateway shutting down");
            })
            .await
            .context("gateway server error")?;

        Ok(())
    }
}
