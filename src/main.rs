//! corpusd command-line interface

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use corpusd::client::HostClient;
use corpusd::config::Config;
use corpusd::gateway::GatewayServer;
use corpusd::host::Host;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "corpusd")]
#[command(about = "Coordinated document index daemon")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "corpusd.toml")]
    config: PathBuf,

    /// Data directory override
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the index host
    Serve,

    /// Run the HTTP gateway (connects to the host first)
    Gateway,

    /// Ask the index a question
    Query {
        /// Query text
        text: String,
    },

    /// Insert a document into the index
    Insert {
        /// Path to the document file
        path: PathBuf,

        /// Optional document id
        #[arg(short = 'i', long)]
        doc_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        config.host.data_dir = data_dir;
    }

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Gateway => gateway(config).await,
        Commands::Query { text } => query(config, text).await,
        Commands::Insert { path, doc_id } => insert(config, path, doc_id).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let host = Host::start(&config).await?;
    host.run().await
}

async fn gateway(config: Config) -> Result<()> {
    // No gateway without a working host connection: connection failure here
    // is an unrecoverable initialization failure.
    let client = connect(&config)
        .await
        .context("unrecoverable gateway initialization failure")?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down");
        let _ = shutdown_tx.send(());
    });

    let server = GatewayServer::new(config.gateway.clone(), client);
    server.run(shutdown_rx).await
}

async fn query(config: Config, text: String) -> Result<()> {
    let mut client = connect(&config).await?;
    let answer = client.query(&text).await?;
    println!("{answer}");
    Ok(())
}

async fn insert(config: Config, path: PathBuf, doc_id: Option<String>) -> Result<()> {
    let path = path
        .canonicalize()
        .with_context(|| format!("cannot resolve '{}'", path.display()))?;

    let mut client = connect(&config).await?;
    let doc_id = client
        .insert_document(&path.display().to_string(), doc_id)
        .await?;
    println!("Inserted document: {doc_id}");
    Ok(())
}

async fn connect(config: &Config) -> Result<HostClient> {
    HostClient::connect(
        &config.host.listen_addr,
        &config.host.auth_token,
        config.client.options(),
    )
    .await
    .with_context(|| format!("failed to connect to index host at {}", config.host.listen_addr))
}
