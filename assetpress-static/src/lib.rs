//! Assetpress Static File Server Module
//!
//! Serving side of asset pre-compression:
//! - Accept-Encoding negotiation over `.br`, `.gz` and identity variants
//! - Content type resolution with a shared cache
//! - Conditional and range requests

mod content;
mod encoding;
mod file_server;
mod mime;
mod sniff;

pub use content::{Body, ByteRange, Content, parse_range, serve_content};
pub use encoding::{AcceptEncoding, CATALOG, Encoding, QualityItem};
pub use file_server::{FileServer, FileServerConfig, normalize_path, not_found};
pub use mime::{ContentSource, ContentTypeCache, ContentTypeResolver, Detector, guess_mime_type};
pub use sniff::{OCTET_STREAM, SNIFF_LEN, signature, sniff};

/// Helpers for building response bodies
pub mod body {
    pub use crate::content::{empty, full};
}
