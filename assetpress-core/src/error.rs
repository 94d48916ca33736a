//! Error types for Assetpress

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Assetpress operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Assetpress
#[derive(Error, Debug)]
pub enum Error {
    /// The compression root exists but is not a directory
    #[error("Path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// A match rule pattern failed to compile
    #[error("Invalid match pattern: {0}")]
    InvalidPattern(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
