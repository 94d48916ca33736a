//! Configuration type definitions
//!
//! These types represent the runtime configuration for Assetpress.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::{Error, Result};

/// Root configuration for Assetpress
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssetpressConfig {
    /// Build-time compression pass
    #[serde(default)]
    pub compress: Option<CompressConfig>,

    /// Static file server
    #[serde(default)]
    pub server: Option<ServerConfig>,

    /// Global logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AssetpressConfig {
    /// Check the cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        if let Some(compress) = &self.compress {
            compress.validate()?;
        }
        if let Some(server) = &self.server {
            server.validate()?;
        }
        Ok(())
    }
}

/// Compression pass configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompressConfig {
    /// Directories to walk
    #[serde(default)]
    pub roots: Vec<String>,

    /// File name suffixes to match (defaults to common web assets)
    #[serde(default)]
    pub extensions: Option<Vec<String>>,

    /// Regular expression searched against file names
    #[serde(default)]
    pub pattern: Option<String>,

    /// Re-encode artifacts older than their source
    #[serde(default)]
    pub refresh_stale: bool,
}

impl CompressConfig {
    fn validate(&self) -> Result<()> {
        if self.roots.is_empty() {
            return Err(Error::Config("compress.roots must not be empty".to_string()));
        }
        if self.extensions.is_some() && self.pattern.is_some() {
            return Err(Error::Config(
                "compress.extensions and compress.pattern are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Static file server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Root directory to serve
    pub root: String,

    /// Path prefix the file server is mounted under
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// File served for `/`
    #[serde(default = "default_index")]
    pub index: String,

    /// Compress the root before serving
    #[serde(default)]
    pub precompress: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            root: ".".to_string(),
            prefix: default_prefix(),
            index: default_index(),
            precompress: false,
        }
    }
}

impl ServerConfig {
    /// Parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let listen = if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        };
        listen
            .parse()
            .map_err(|e| Error::Config(format!("Invalid listen address {}: {}", self.listen, e)))
    }

    fn validate(&self) -> Result<()> {
        if self.root.is_empty() {
            return Err(Error::Config("server.root must not be empty".to_string()));
        }
        if !self.prefix.starts_with('/') {
            return Err(Error::Config(format!(
                "server.prefix must start with '/': {}",
                self.prefix
            )));
        }
        if self.index.is_empty() || self.index.contains('/') {
            return Err(Error::Config(format!("Invalid index file name: {:?}", self.index)));
        }
        self.listen_addr().map(|_| ())
    }
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_prefix() -> String {
    "/".to_string()
}

fn default_index() -> String {
    "index.html".to_string()
}

/// Global logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
