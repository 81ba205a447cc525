//! Manages the `/etc/tputd.conf` file.
//!
//! The daemon runs happily with no configuration file at all; every
//! key has a default. Set `TPUTD_CONFIG` to point at an alternate
//! file (used by packaging and tests).

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "/etc/tputd.conf";

/// Top-level configuration for the throughput test daemon.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Version number for the configuration file schema.
    #[serde(default = "default_version")]
    pub version: String,

    /// Listen address for the raw stream-transport test port.
    #[serde(default = "default_stream_listen")]
    pub stream_listen: String,

    /// Listen address for the HTTP test port. TLS termination, when
    /// wanted, is an external concern (a fronting proxy or a wrapped
    /// listener) and is not configured here.
    #[serde(default = "default_web_listen")]
    pub web_listen: String,

    /// Cumulative bytes within one download response after which the
    /// pacing delay kicks in. Tunable, not a protocol contract.
    #[serde(default = "default_pacing_threshold")]
    pub pacing_threshold_bytes: usize,

    /// Pause inserted between chunk writes once past the pacing
    /// threshold, in milliseconds. Zero disables pacing.
    #[serde(default = "default_pacing_delay")]
    pub pacing_delay_ms: u64,

    /// Largest payload the POST throughput fallback will return
    /// inline as hex JSON. Anything larger gets a 413; use the
    /// streaming GET endpoint for real transfers.
    #[serde(default = "default_inline_post_cap")]
    pub inline_post_cap_bytes: usize,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_stream_listen() -> String {
    "0.0.0.0:2021".to_string()
}

fn default_web_listen() -> String {
    "0.0.0.0:2020".to_string()
}

fn default_pacing_threshold() -> usize {
    1024 * 1024
}

fn default_pacing_delay() -> u64 {
    1
}

fn default_inline_post_cap() -> usize {
    4 * 1024 * 1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            stream_listen: default_stream_listen(),
            web_listen: default_web_listen(),
            pacing_threshold_bytes: default_pacing_threshold(),
            pacing_delay_ms: default_pacing_delay(),
            inline_post_cap_bytes: default_inline_post_cap(),
        }
    }
}

impl Config {
    /// Parses a configuration from TOML text.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml_edit::de::from_str(raw).map_err(|e| {
            error!("Unable to parse configuration: {e:?}");
            ConfigError::ParseError(e.to_string())
        })
    }
}

/// Loads the daemon configuration, honoring the `TPUTD_CONFIG`
/// override. A missing file is not an error: defaults apply.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = std::env::var("TPUTD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(Path::new(&path))
}

/// Loads a configuration from an explicit path; missing file means
/// defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        info!(
            "No configuration file at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|e| {
        error!("Unable to read {}: {e:?}", path.display());
        ConfigError::ReadError
    })?;
    Config::from_toml(&raw)
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read configuration file")]
    ReadError,
    #[error("Unable to parse configuration file: {0}")]
    ParseError(String),
}
