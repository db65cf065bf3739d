//! Server configuration.
//!
//! Values come from, in increasing priority:
//! 1. built-in defaults
//! 2. a TOML file (`--config <path>`, else `<config dir>/chat/chatd.toml` if it exists)
//! 3. command-line flags (applied by the binary)
//!
//! ```toml
//! ip = "0.0.0.0"
//! port = 8888
//! idle_timeout_ms = 10000
//! mailbox_capacity = 256
//! hub_capacity = 1024
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::hub::DEFAULT_HUB_CAPACITY;
use crate::mailbox::DEFAULT_MAILBOX_CAPACITY;

/// Default bind address
pub const DEFAULT_IP: &str = "127.0.0.1";

/// Default port
pub const DEFAULT_PORT: u16 = 8888;

/// Default inactivity window in milliseconds
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 10_000;

/// Default inactivity window before a session is evicted
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS);

/// Configuration for the chat server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub ip: String,

    /// Port to bind the listener to (0 picks a free port)
    pub port: u16,

    /// Inactivity window in milliseconds
    pub idle_timeout_ms: u64,

    /// Outbound lines a session may have queued before deliveries drop
    pub mailbox_capacity: usize,

    /// Public messages queued for fan-out before publishers wait
    pub hub_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_IP.to_string(),
            port: DEFAULT_PORT,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            hub_capacity: DEFAULT_HUB_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Returns the inactivity window.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Returns `ip:port` for logging.
    pub fn bind_addr(&self) -> String {
        if self.ip.contains(':') {
            format!("[{}]:{}", self.ip, self.port)
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }

    /// Sets the inactivity window from whole seconds, saturating on overflow.
    pub fn set_idle_timeout_secs(&mut self, secs: u64) {
        self.idle_timeout_ms = secs.saturating_mul(1000);
    }

    /// Checks values that parse but cannot run a server.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `idle_timeout_ms` is zero, which
    /// would evict every client the moment it connects.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "idle_timeout_ms",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    /// Parses a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Read` if the file cannot be read
    /// - `ConfigError::Parse` if it is not valid configuration TOML
    /// - `ConfigError::Invalid` if a value fails [`ServerConfig::validate`]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `explicit` if given, otherwise the default file if present,
    /// otherwise the built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Returns the path of the default configuration file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chat").join("chatd.toml"))
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}
