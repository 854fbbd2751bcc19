//! Relay configuration, loaded once at startup.
//!
//! The configuration file is TOML. The listen port is not part of it — the
//! port is supplied on the command line — so the file carries only the
//! downstream endpoint list, the socket timeouts, and the debug flag.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// One downstream consumer of the relayed traffic.
///
/// List order is significant: the first endpoint is the only one whose
/// replies are relayed back to the client.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
}

impl EndpointConfig {
    /// `host:port` rendering used for connecting and for log context.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Immutable relay configuration. Shared read-only by every session.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Milliseconds the listen socket waits for a client before logging and
    /// retrying the accept.
    pub accept_timeout_ms: u64,
    /// Milliseconds any session socket read (and each downstream connect
    /// attempt) may block before the session is torn down.
    pub read_timeout_ms: u64,
    /// Downstream endpoints in fan-out order.
    pub endpoints: Vec<EndpointConfig>,
    /// Verbose logging, including hex dumps of every relayed packet.
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl RelayConfig {
    /// Load and validate the configuration file at `path`.
    pub fn load(path: &Path) -> Result<RelayConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: RelayConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one downstream endpoint is required".into(),
            ));
        }
        for (i, endpoint) in self.endpoints.iter().enumerate() {
            if endpoint.host.is_empty() {
                return Err(ConfigError::Invalid(format!("endpoint {i} has an empty host")));
            }
            if endpoint.port == 0 {
                return Err(ConfigError::Invalid(format!("endpoint {i} has port 0")));
            }
        }
        Ok(())
    }

    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
