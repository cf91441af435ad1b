//! Configuration System (C12)
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (ACCOUNTS_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [storage]
//! data_dir = "./data"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! ACCOUNTS_SERVER__PORT=9000
//! ACCOUNTS_STORAGE__DATA_DIR=/custom/path
//! ```
//!
//! The two positional CLI arguments (`port`, `data_dir`) take precedence over
//! everything below when present (§6).

use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Quiet period with no writes before a rebuild (C11) fires.
    #[serde(default = "default_rebuild_window_ms")]
    pub rebuild_window_ms: u64,
    /// Concurrent in-flight request bound (§5).
    #[serde(default = "default_admission_limit")]
    pub admission_limit: usize,
}

impl ServerConfig {
    pub fn rebuild_window(&self) -> Duration {
        Duration::from_millis(self.rebuild_window_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory the loader (C14) reads `*.json` and `options.txt` from.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_rebuild_window_ms() -> u64 {
    1200
}
fn default_admission_limit() -> usize {
    256
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
            rebuild_window_ms: default_rebuild_window_ms(),
            admission_limit: default_admission_limit(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Merges, in order: built-in defaults, `config.toml`, `config.local.toml`
    /// (git-ignored), then `ACCOUNTS_*` environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("ACCOUNTS_").split("__"))
            .extract()
    }

    /// Applies the two positional CLI arguments on top of whatever `load()`
    /// produced; these always win (§6).
    pub fn with_cli_overrides(mut self, port: Option<u16>, data_dir: Option<PathBuf>) -> Self {
        if let Some(port) = port {
            self.server.port = port;
        }
        if let Some(data_dir) = data_dir {
            self.storage.data_dir = data_dir;
        }
        self
    }
}
