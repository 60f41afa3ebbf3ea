//! Configuration for corpusd

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::ConnectOptions;

/// Environment variable overriding the configured shared token
pub const AUTH_TOKEN_ENV: &str = "CORPUSD_AUTH_TOKEN";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Index host configuration
    #[serde(default)]
    pub host: HostConfig,
    /// Coordination client configuration
    #[serde(default)]
    pub client: ClientConfig,
    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: HostConfig::default(),
            client: ClientConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, apply environment overrides,
    /// and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise fall back to defaults
    /// (still applying environment overrides and validating).
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let mut config = Config::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Pull the shared token from the environment when set
    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(AUTH_TOKEN_ENV) {
            if !token.is_empty() {
                self.host.auth_token = token;
            }
        }
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together so the user
    /// can fix everything in one pass.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.host.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "host.listen_addr '{}' is not a valid host:port address",
                self.host.listen_addr
            ));
        }
        if self.host.data_dir.as_os_str().is_empty() {
            errors.push("host.data_dir must not be empty".to_string());
        }
        if self.host.auth_token.is_empty() {
            errors.push(format!(
                "host.auth_token must not be empty (set it in config or {})",
                AUTH_TOKEN_ENV
            ));
        }

        if self.client.connect_attempts == 0 {
            errors.push("client.connect_attempts must be positive".to_string());
        }
        if self.client.retry_interval_ms == 0 {
            errors.push("client.retry_interval_ms must be positive".to_string());
        }

        if self.gateway.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "gateway.listen_addr '{}' is not a valid host:port address",
                self.gateway.listen_addr
            ));
        }
        if self.gateway.upload_dir.as_os_str().is_empty() {
            errors.push("gateway.upload_dir must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}

/// Index host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Fixed host:port the RPC server binds to
    #[serde(default = "default_host_listen_addr")]
    pub listen_addr: String,
    /// Data directory for the persisted index image and PID file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Optional bootstrap corpus directory, indexed when no image exists
    #[serde(default)]
    pub bootstrap_dir: Option<PathBuf>,
    /// Shared token validated at connection handshake time
    #[serde(default = "default_auth_token")]
    pub auth_token: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_host_listen_addr(),
            data_dir: default_data_dir(),
            bootstrap_dir: None,
            auth_token: default_auth_token(),
        }
    }
}

/// Coordination client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Wait before the first connection attempt (the host may still be
    /// initializing its index)
    #[serde(default = "default_grace_ms")]
    pub connect_grace_ms: u64,
    /// Bounded number of connection attempts
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Fixed delay between attempts
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_grace_ms: default_grace_ms(),
            connect_attempts: default_connect_attempts(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl ClientConfig {
    /// Connection retry policy with these settings
    pub fn options(&self) -> ConnectOptions {
        ConnectOptions {
            grace: Duration::from_millis(self.connect_grace_ms),
            attempts: self.connect_attempts,
            retry_interval: Duration::from_millis(self.retry_interval_ms),
        }
    }
}

/// HTTP gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Listen address for the HTTP front-end
    #[serde(default = "default_gateway_listen_addr")]
    pub listen_addr: String,
    /// Directory uploaded files are saved to before insertion
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Enable permissive CORS (useful for browser-based clients)
    #[serde(default = "default_cors_enabled")]
    pub cors_enabled: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_gateway_listen_addr(),
            upload_dir: default_upload_dir(),
            cors_enabled: default_cors_enabled(),
        }
    }
}

fn default_host_listen_addr() -> String {
    "127.0.0.1:5602".to_string()
}

fn default_gateway_listen_addr() -> String {
    "127.0.0.1:5601".to_string()
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "corpusd")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".corpusd"))
}

fn default_upload_dir() -> PathBuf {
    default_data_dir().join("uploads")
}

fn default_auth_token() -> String {
    // Development default; deployments set their own via config or env
    "corpusd-dev".to_string()
}

fn default_grace_ms() -> u64 {
    1000
}

fn default_connect_attempts() -> u32 {
    20
}

fn default_retry_interval_ms() -> u64 {
    1000
}

fn default_cors_enabled() -> bool {
    true
}
