//! Server configuration.
//!
//! Configuration is read from an optional JSON file. Every field has a
//! default, so an empty object (or no file at all) yields a working setup:
//! command port 8000, notification port 8001, REST façade on 8080 and the
//! device file `./device.csv` polled once per second.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`BedConfig`].
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BedConfig {
    /// Address all listeners bind to.
    pub host: String,

    /// Command protocol port.
    pub command_port: u16,

    /// Notification protocol port.
    pub notify_port: u16,

    /// REST façade port.
    pub http_port: u16,

    /// Start the REST façade.
    pub enable_http: bool,

    /// Backing device file.
    pub device_file: PathBuf,

    /// Ingestor poll interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for BedConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            command_port: 8000,
            notify_port: 8001,
            http_port: 8080,
            enable_http: true,
            device_file: PathBuf::from("./device.csv"),
            poll_interval_ms: 1000,
        }
    }
}

impl BedConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn command_addr(&self) -> String {
        format!("{}:{}", self.host, self.command_port)
    }

    pub fn notify_addr(&self) -> String {
        format!("{}:{}", self.host, self.notify_port)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
