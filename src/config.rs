//! Configuration management for shell-bridge.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::ServerConfig;
use crate::bridge::BridgeConfig;
use crate::cli::Args;
use crate::pty::{default_shell, PtySize, SpawnSpec, DEFAULT_PATH, DEFAULT_TERM};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerSection,
    /// Authentication configuration.
    pub auth: AuthSection,
    /// Spawned session configuration.
    pub session: SessionSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable graceful shutdown.
    pub graceful_shutdown: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            graceful_shutdown: true,
        }
    }
}

/// Authentication configuration.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Shared secret. Without one every connection is refused.
    pub secret: Option<String>,
}

impl std::fmt::Debug for AuthSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSection")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Session configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Program to run; the login shell when unset.
    pub shell: Option<String>,
    /// Arguments for the program.
    pub args: Vec<String>,
    /// Value of `TERM`.
    pub term: String,
    /// Value of `PATH`.
    pub path: String,
    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
    /// Default terminal rows.
    pub rows: u16,
    /// Default terminal columns.
    pub cols: u16,
    /// Grace period between hangup and kill, in milliseconds.
    pub kill_grace_ms: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        let size = PtySize::default();
        Self {
            shell: None,
            args: Vec::new(),
            term: DEFAULT_TERM.to_string(),
            path: DEFAULT_PATH.to_string(),
            env: BTreeMap::new(),
            rows: size.rows,
            cols: size.cols,
            kill_grace_ms: 2000,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a filter directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source (for testing).
    pub fn apply_env_from<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("SHELL_BRIDGE_HOST") {
            self.server.host = host;
        }

        if let Some(port) = var("SHELL_BRIDGE_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Some(secret) = var("SHELL_BRIDGE_SECRET") {
            if !secret.is_empty() {
                self.auth.secret = Some(secret);
            }
        }

        if let Some(shell) = var("SHELL_BRIDGE_SHELL") {
            if !shell.is_empty() {
                self.session.shell = Some(shell);
            }
        }

        if let Some(level) = var("SHELL_BRIDGE_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(ref secret) = args.secret {
            self.auth.secret = Some(secret.clone());
        }
        if let Some(ref shell) = args.shell {
            self.session.shell = Some(shell.clone());
        }
        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// The socket address to listen on.
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;
        Ok(SocketAddr::new(host, self.server.port))
    }

    /// Convert to ServerConfig for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let mut server_config = ServerConfig::new(self.bind_address()?);
        if !self.server.graceful_shutdown {
            server_config = server_config.without_graceful_shutdown();
        }
        Ok(server_config)
    }

    /// Convert to the runtime settings of the bridge.
    pub fn to_bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
        let session = &self.session;
        let size = PtySize::new(session.rows, session.cols);
        if !size.is_valid() {
            return Err(ConfigError::InvalidSize(session.rows, session.cols));
        }

        let program = session
            .shell
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(default_shell);

        let mut spawn = SpawnSpec::shell(program)
            .with_args(session.args.iter().cloned())
            .with_size(size);
        spawn.term = session.term.clone();
        spawn.path = session.path.clone();
        spawn.env = session.env.clone();

        Ok(BridgeConfig {
            secret: self.auth.secret.clone(),
            spawn,
            kill_grace: Duration::from_millis(session.kill_grace_ms),
        })
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
    /// Terminal dimensions with a zero side.
    InvalidSize(u16, u16),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
            Self::InvalidSize(rows, cols) => {
                write!(f, "invalid terminal size: {}x{}", rows, cols)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
