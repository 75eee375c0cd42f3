/// Service configuration structures

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: Server,
    pub logging: Logging,
    pub external: External,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Server {
    pub bind_address: String,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Directory for the rolling JSON log file
    pub directory: String,
    pub file_prefix: String,
    /// Filter used when RUST_LOG is not set
    pub default_level: String,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file_prefix: "txstats.log".to_string(),
            default_level: "info".to_string(),
        }
    }
}

/// Settings for the outbound REST client
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct External {
    pub base_url: String,
    pub oauth_consumer_key: Option<String>,
    pub oauth_signature: Option<String>,
    pub connect_timeout_ms: u64,
    /// Per-request timeout, also the pause after a failed connection
    pub read_timeout_ms: u64,
    pub retry_attempts: u32,
}

impl Default for External {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9090".to_string(),
            oauth_consumer_key: None,
            oauth_signature: None,
            connect_timeout_ms: 5_000,
            read_timeout_ms: 10_000,
            retry_attempts: 3,
        }
    }
}
