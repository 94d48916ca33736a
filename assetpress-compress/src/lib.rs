//! Assetpress Compression Module
//!
//! Walks a static asset tree and leaves `.gz` and `.br` siblings next to
//! every matched file, ready to be picked up by the negotiating file
//! server at request time.
//!
//! ```no_run
//! use assetpress_compress::{compress_files, compress_webserver_files, MatchRule};
//!
//! // Common web assets (js, css, html, json, svg, ico, eot, otf, ttf, woff)
//! let matched = compress_webserver_files("public")?;
//!
//! // Custom suffix set
//! let rule = MatchRule::from_suffixes(["wasm", "map"])?;
//! let matched = compress_files("public", &rule)?;
//! # Ok::<(), assetpress_core::Error>(())
//! ```

mod encoder;
mod matcher;
mod walker;

pub use encoder::{Algorithm, BrotliMode};
pub use matcher::{MatchRule, WEB_EXTENSIONS};
pub use walker::{compress_files, compress_webserver_files, ArtifactPolicy, Compressor};
