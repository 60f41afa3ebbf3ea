//! Host lifecycle
//!
//! Assembles the index service, request handler, and RPC server into the
//! long-lived host process: single-instance PID guard, initialization under
//! the index lock, and graceful shutdown on Ctrl-C / SIGTERM.

use std::fs::File;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::KeywordEngine;

use super::handler::RequestHandler;
use super::server::RpcServer;
use super::service::IndexService;

/// PID file for the single-instance guarantee
const PID_FILE_NAME: &str = "corpusd.pid";

/// Host process owning the index and serving remote operations on it
pub struct Host {
    listen_addr: SocketAddr,
    token: String,
    handler: Arc<RequestHandler>,
    shutdown_tx: broadcast::Sender<()>,
    pid_file_path: PathBuf,
}

impl Host {
    /// Initialize the host: PID lock, index recovery, handler wiring.
    /// The RPC listener binds in [`Host::run`].
    pub async fn start(config: &Config) -> Result<Self> {
        info!("Starting corpusd host");

        let listen_addr: SocketAddr = config
            .host
            .listen_addr
            .parse()
            .context("invalid host listen address")?;

        std::fs::create_dir_all(&config.host.data_dir)
            .with_context(|| format!("failed to create '{}'", config.host.data_dir.display()))?;

        let pid_file_path = config.host.data_dir.join(PID_FILE_NAME);
        acquire_lock(&pid_file_path)?;

        let service = Arc::new(IndexService::new(
            Box::new(KeywordEngine),
            &config.host.data_dir,
            config.host.bootstrap_dir.clone(),
        ));
        service
            .initialize()
            .await
            .context("failed to initialize index service")?;

        let handler = Arc::new(RequestHandler::new(service));
        let (shutdown_tx, _) = broadcast::channel(16);

        info!("Host initialized");
        info!("Data directory: {}", config.host.data_dir.display());
        info!("Listen address: {}", listen_addr);

        Ok(Self {
            listen_addr,
            token: config.host.auth_token.clone(),
            handler,
            shutdown_tx,
            pid_file_path,
        })
    }

    /// Run the host until a shutdown signal arrives
    pub async fn run(&self) -> Result<()> {
        info!("Host running");

        let server = RpcServer::new(
            self.listen_addr,
            self.token.clone(),
            self.handler.clone(),
        );
        let shutdown_rx = self.shutdown_tx.subscribe();
        let server_handle = tokio::spawn(async move {
            match server.run(shutdown_rx).await {
                Ok(()) => info!("RPC server shut down cleanly"),
                Err(e) => tracing::error!("RPC server failed: {:#}", e),
            }
        });

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
            }
            _ = wait_for_sigterm() => {
                info!("Received SIGTERM, shutting down");
            }
            _ = wait_for_shutdown(self.shutdown_tx.subscribe()) => {
                info!("Shutdown requested");
            }
        }

        let _ = self.shutdown_tx.send(());

        let server_abort = server_handle.abort_handle();
        if tokio::time::timeout(Duration::from_secs(5), server_handle)
            .await
            .is_err()
        {
            warn!("RPC server did not shut down within 5s, aborting");
            server_abort.abort();
        }

        self.shutdown()
    }

    /// Release resources and report counters
    fn shutdown(&self) -> Result<()> {
        let stats = self.handler.service().stats();
        info!(
            "Host shutdown complete ({} queries, {} inserts served)",
            stats.queries, stats.inserts
        );
        release_lock(&self.pid_file_path)
    }

    /// Sender that triggers a graceful shutdown
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// The request handler (exposed for in-process callers and tests)
    pub fn request_handler(&self) -> Arc<RequestHandler> {
        self.handler.clone()
    }
}

/// Acquire the single-instance lock via PID file.
///
/// Uses `create_new(true)` for atomic creation to avoid TOCTOU races where
/// two processes could interleave exists/read/remove/create.
fn acquire_lock(pid_file_path: &Path) -> Result<()> {
    use std::fs::OpenOptions;

    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(pid_file_path)
    {
        Ok(mut file) => {
            writeln!(file, "{}", std::process::id())?;
            return Ok(());
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            // File exists; check staleness below
        }
        Err(e) => {
            return Err(e).context("failed to create PID file");
        }
    }

    let mut contents = String::new();
    File::open(pid_file_path)?.read_to_string(&mut contents)?;
    if let Ok(pid) = contents.trim().parse::<u32>() {
        if process_exists(pid) {
            anyhow::bail!(
                "Host is already running (PID {}). Stop it first or remove {}",
                pid,
                pid_file_path.display()
            );
        }
    }

    // Stale PID file; remove and retry once
    std::fs::remove_file(pid_file_path)?;
    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(pid_file_path)
    {
        Ok(mut file) => {
            writeln!(file, "{}", std::process::id())?;
            Ok(())
        }
        Err(e) => Err(e).context("failed to create PID file after removing stale lock"),
    }
}

fn release_lock(pid_file_path: &Path) -> Result<()> {
    if pid_file_path.exists() {
        std::fs::remove_file(pid_file_path)?;
    }
    Ok(())
}

/// Check whether the host is running against the given data directory
pub fn is_host_running(data_dir: &Path) -> bool {
    get_host_pid(data_dir).is_some()
}

/// PID of the running host, if any
pub fn get_host_pid(data_dir: &Path) -> Option<u32> {
    let pid_file_path = data_dir.join(PID_FILE_NAME);
    let mut contents = String::new();
    File::open(pid_file_path)
        .ok()?
        .read_to_string(&mut contents)
        .ok()?;
    contents
        .trim()
        .parse()
        .ok()
        .filter(|&pid| process_exists(pid))
}

/// Check if a process with the given PID exists
fn process_exists(pid: u32) -> bool {
    #[cfg(unix)]
    {
        // Signal 0 probes for existence without delivering anything
        unsafe { libc::kill(pid as i32, 0) == 0 }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

async fn wait_for_shutdown(mut rx: broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}
