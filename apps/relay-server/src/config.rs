//! Relay server configuration.
//!
//! Loaded from environment variables with the `DESIGN_RELAY` prefix; nested
//! values are separated by `__`:
//!
//! - `DESIGN_RELAY__SERVER__PORT=3001` -> `server.port`
//! - `DESIGN_RELAY__AGENT__URL=http://localhost:5100/agent` -> `agent.url`
//! - `DESIGN_RELAY__RELAY__CONTEXT_PRECEDENCE=store` -> `relay.context_precedence`

use std::{net::SocketAddr, time::Duration};

use design_relay_session::RelaySettings;
use serde::Deserialize;
use thiserror::Error;

const ENV_PREFIX: &str = "DESIGN_RELAY";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid port number")]
    InvalidPort,
    #[error("Invalid server address: {0}")]
    InvalidAddress(String),
    #[error("Agent timeout must be between 1 and 600 seconds")]
    InvalidTimeout,
    #[error("Agent URL must start with http:// or https://: {0}")]
    InvalidAgentUrl(String),
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub relay: RelaySettings,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Allowed CORS origins, comma-separated. Permissive when unset.
    pub cors_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            cors_origins: None,
        }
    }
}

impl ServerConfig {
    /// Address to bind.
    ///
    /// # Errors
    /// Returns error if host and port do not form a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(format!("{}:{}", self.host, self.port)))
    }

    pub fn cors_origins_list(&self) -> Vec<String> {
        self.cors_origins
            .as_deref()
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Downstream agent settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: default_agent_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AgentConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RelayConfig {
    /// Load `.env` if present, then the process environment.
    ///
    /// # Errors
    /// Returns error if a variable cannot be parsed into its field.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_env(source: config::Environment) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(source.prefix_separator("__").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Semantic checks beyond parsing.
    ///
    /// # Errors
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        self.server.socket_addr()?;
        if self.agent.timeout_secs == 0 || self.agent.timeout_secs > 600 {
            return Err(ConfigError::InvalidTimeout);
        }
        if !(self.agent.url.starts_with("http://") || self.agent.url.starts_with("https://")) {
            return Err(ConfigError::InvalidAgentUrl(self.agent.url.clone()));
        }
        Ok(())
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3001
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_agent_url() -> String {
    "http://localhost:5100/agent".to_string()
}

const fn default_timeout_secs() -> u64 {
    60
}
