//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/hive-lineage/config.toml`, then
//! host properties can override the collector settings.
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/hive-lineage/` (~/.config/hive-lineage/)
//! - State/Logs: `$XDG_STATE_HOME/hive-lineage/` (~/.local/state/hive-lineage/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Host property overriding the collector endpoint
pub const URI_PROPERTY: &str = "hadoop.metadata.hive.hook.uri";

/// Host property toggling certificate validation for https endpoints
pub const ACCEPT_INVALID_CERTS_PROPERTY: &str =
    "hadoop.metadata.hive.hook.tls.accept-invalid-certs";

pub const DEFAULT_COLLECTOR_HOST: &str = "localhost";
pub const DEFAULT_COLLECTOR_PORT: u16 = 20810;
pub const DEFAULT_COLLECTOR_PATH: &str = "/entities/submit/HiveLineage";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Collector delivery settings
    #[serde(default)]
    pub hook: HookConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Collector delivery configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HookConfig {
    /// Collector endpoint override; the compiled-in default is used when unset
    pub uri: Option<String>,

    /// Skip certificate and hostname validation for https endpoints
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// HTTP request timeout in seconds, 0 for none
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Upper bound on how much of the response body is read
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            uri: None,
            accept_invalid_certs: false,
            timeout_secs: default_timeout(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_response_bytes() -> usize {
    64 * 1024
}

impl HookConfig {
    /// The endpoint records are posted to
    pub fn endpoint(&self) -> String {
        match &self.uri {
            Some(uri) => uri.clone(),
            None => format!(
                "http://{}:{}{}",
                DEFAULT_COLLECTOR_HOST, DEFAULT_COLLECTOR_PORT, DEFAULT_COLLECTOR_PATH
            ),
        }
    }

    /// Overlay settings from host configuration properties.
    ///
    /// Values are trimmed; an empty endpoint counts as unset.
    pub fn apply_properties(&mut self, properties: &HashMap<String, String>) -> Result<()> {
        if let Some(uri) = properties.get(URI_PROPERTY).map(|v| v.trim()) {
            if !uri.is_empty() {
                self.uri = Some(uri.to_string());
            }
        }

        if let Some(flag) = properties.get(ACCEPT_INVALID_CERTS_PROPERTY) {
            self.accept_invalid_certs = match flag.trim().to_ascii_lowercase().as_str() {
                "true" => true,
                "false" | "" => false,
                other => {
                    return Err(Error::Config(format!(
                        "{} must be true or false, got {:?}",
                        ACCEPT_INVALID_CERTS_PROPERTY, other
                    )))
                }
            };
        }

        Ok(())
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.max_response_bytes == 0 {
            return Err(Error::Config(
                "hook.max_response_bytes must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.hook.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/hive-lineage/config.toml` (~/.config/hive-lineage/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("hive-lineage").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/hive-lineage/` (~/.local/state/hive-lineage/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("hive-lineage")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("hive-lineage.log")
    }
}
