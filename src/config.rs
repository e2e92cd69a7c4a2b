//! # Bridge Configuration
//!
//! Loads the TOML configuration of the bridge. Every field has a default, so a
//! missing file (or a missing section) degrades to a working local setup:
//! broker on `localhost:1883`, HTTP listener on port 80.
//!
//! ## Lookup Order
//!
//! 1. Path passed explicitly (first CLI argument)
//! 2. `$ENERGYSMART_CONFIG`
//! 3. `<config dir>/energysmart-bridge/config.toml`
//!
//! A file that exists but does not parse is an error: silently running with
//! defaults against the wrong broker is worse than refusing to start.
//!
//! ## Example
//!
//! ```toml
//! [http]
//! bind = "0.0.0.0:8080"
//!
//! [mqtt]
//! host = "broker.lan"
//! username = "bridge"
//! password = "secret"
//!
//! [bridge]
//! log_level = "debug"
//! ```

use crate::error::Result;
use crate::mqtt::config::MqttConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_ENV: &str = "ENERGYSMART_CONFIG";
const CONFIG_DIR: &str = "energysmart-bridge";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub mqtt: MqttConfig,
    pub bridge: BridgeSettings,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    /// Socket address the poll endpoint listens on
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:80".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeSettings {
    /// Upper bound for flushing "offline" and the disconnect on shutdown
    pub shutdown_timeout_secs: u64,
    /// One of trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: 5,
            log_level: "info".to_string(),
        }
    }
}

impl BridgeSettings {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Parsed log level, INFO when the configured value is unknown
    pub fn level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

impl Config {
    /// Resolves the config location and loads it
    pub async fn load(explicit: Option<PathBuf>) -> Result<Self> {
        let path = explicit
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(default_path);

        match path {
            Some(path) => Self::load_from(&path).await,
            None => {
                warn!("No config directory available, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Loads a config file, falling back to defaults if it does not exist
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            info!("Config file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

fn default_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    Some(path)
}
