//! Assetpress Core Library
//!
//! Shared building blocks for the Assetpress crates: the error type used
//! across the workspace and the configuration model with its loader.

pub mod config;
pub mod error;

pub use error::{Error, Result};

/// Assetpress version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
