/// Configuration loading for the statistics service
///
/// Defaults cover a local run. A TOML file named by `TXSTATS_CONFIG` replaces
/// them, and `TXSTATS_BIND` overrides the listen address on top of that.

pub mod settings;

pub use settings::*;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "TXSTATS_CONFIG";
pub const BIND_ADDRESS_ENV: &str = "TXSTATS_BIND";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Config file named by `TXSTATS_CONFIG`, if any
pub fn config_path() -> Option<PathBuf> {
    std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from)
}

impl ServiceConfig {
    /// Defaults, then the optional file, then environment overrides.
    /// Runs before logging is set up, so it does not log.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(config_path().as_deref(), std::env::var(BIND_ADDRESS_ENV).ok())
    }

    pub fn load_with(path: Option<&Path>, bind_override: Option<String>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };

        let config = config.with_bind_override(bind_override);
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_bind_override(mut self, bind_address: Option<String>) -> Self {
        if let Some(address) = bind_address.filter(|a| !a.trim().is_empty()) {
            self.server.bind_address = address;
        }
        self
    }

    /// Checks what the statistics service needs to start. `[external]` is
    /// checked when a client is built from it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_address()?;
        Ok(())
    }

    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.server.bind_address.clone()))
    }
}

impl External {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "external.retry_attempts",
                reason: "must be at least 1".to_string(),
            });
        }

        if url::Url::parse(&self.base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "external.base_url",
                reason: format!("'{}' is not an absolute URL", self.base_url),
            });
        }

        Ok(())
    }
}
