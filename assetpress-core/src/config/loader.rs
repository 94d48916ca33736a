//! Configuration loader

use crate::config::AssetpressConfig;
use crate::error::{Error, Result};
use std::path::Path;

/// Configuration loader for various formats
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<AssetpressConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config = match ext {
            "json" => Self::from_json(&content)?,
            "toml" => Self::from_toml(&content)?,
            _ => return Err(Error::Config(format!("Unknown config format: {:?}", ext))),
        };

        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse JSON configuration
    pub fn from_json(content: &str) -> Result<AssetpressConfig> {
        serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid JSON: {}", e)))
    }

    /// Parse TOML configuration
    pub fn from_toml(content: &str) -> Result<AssetpressConfig> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_loading() {
        let json = r#"{"logging": {"level": "debug"}}"#;
        let config = ConfigLoader::from_json(json).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_toml_loading() {
        let toml = r#"
            [compress]
            roots = ["public"]
            extensions = ["js", "css"]

            [server]
            listen = "0.0.0.0:3000"
            root = "public"
            prefix = "/static"
        "#;
        let config = ConfigLoader::from_toml(toml).unwrap();
        let compress = config.compress.unwrap();
        assert_eq!(compress.roots, vec!["public".to_string()]);
        assert_eq!(compress.extensions, Some(vec!["js".to_string(), "css".to_string()]));
        assert!(!compress.refresh_stale);
        assert_eq!(config.server.unwrap().prefix, "/static");
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assetpress.yaml");
        std::fs::write(&path, "server: {}").unwrap();
        assert!(matches!(ConfigLoader::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assetpress.toml");
        std::fs::write(&path, "[server]\nroot = \"\"\n").unwrap();
        assert!(ConfigLoader::load(&path).is_err());
    }

    #[test]
    fn test_invalid_json() {
        assert!(ConfigLoader::from_json("{").is_err());
    }
}
