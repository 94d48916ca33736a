//! Negotiating file server
//!
//! Serves the best pre-compressed variant of a requested asset. For a
//! logical path `/app.js` the candidates are `app.js.br`, `app.js.gz` and
//! `app.js` under the root, tried in that order and filtered by the
//! client's Accept-Encoding.

use crate::content::{self, Body, Content};
use crate::encoding::{AcceptEncoding, Encoding};
use crate::mime::{ContentSource, ContentTypeResolver};
use assetpress_core::config::ServerConfig;
use async_trait::async_trait;
use http::header::{HeaderValue, VARY};
use http::{HeaderMap, Method, Request, Response, StatusCode};
use percent_encoding::percent_decode_str;
use std::io::{self, Read};
use std::path::PathBuf;
use tokio::fs::File;

/// Compressed bytes read to recover a sniffable prefix
const ENCODED_HEAD_LEN: usize = 8192;

/// Configuration for the file server
#[derive(Debug, Clone)]
pub struct FileServerConfig {
    /// Root directory to serve
    pub root: PathBuf,
    /// File served for `/`
    pub index: String,
}

impl Default for FileServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            index: "index.html".to_string(),
        }
    }
}

impl From<&ServerConfig> for FileServerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root),
            index: config.index.clone(),
        }
    }
}

/// Static file server with content-encoding negotiation
#[derive(Debug, Clone)]
pub struct FileServer {
    config: FileServerConfig,
    resolver: ContentTypeResolver,
}

impl FileServer {
    /// Create a new file server
    pub fn new(config: FileServerConfig) -> Self {
        Self {
            config,
            resolver: ContentTypeResolver::default(),
        }
    }

    /// Create a file server for a directory
    pub fn serve_dir(root: impl Into<PathBuf>) -> Self {
        Self::new(FileServerConfig {
            root: root.into(),
            ..Default::default()
        })
    }

    /// Use a specific content type resolver (and its cache)
    pub fn with_resolver(mut self, resolver: ContentTypeResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// The content type resolver
    pub fn resolver(&self) -> &ContentTypeResolver {
        &self.resolver
    }

    /// The server configuration
    pub fn config(&self) -> &FileServerConfig {
        &self.config
    }

    /// Handle an HTTP request
    pub async fn handle<B>(&self, req: &Request<B>) -> Response<Body> {
        self.serve(req.method(), req.uri().path(), req.headers()).await
    }

    /// Serve a request path.
    ///
    /// Missing candidates are skipped silently; the only failure a client
    /// sees is 404 once every candidate is exhausted.
    pub async fn serve(&self, method: &Method, path: &str, headers: &HeaderMap) -> Response<Body> {
        let Some(logical) = normalize_path(path, &self.config.index) else {
            tracing::debug!("Rejected request path {:?}", path);
            return not_found();
        };
        let accept = AcceptEncoding::from_headers(headers);

        for encoding in accept.candidates() {
            let Some((file, len, modified)) = self.open_candidate(&logical, encoding).await else {
                continue;
            };

            let mut file = file;
            let content_type = if encoding.is_identity() {
                self.resolver.resolve(&logical, &mut file).await
            } else {
                let mut source = EncodedSource {
                    file: &mut file,
                    encoding,
                };
                self.resolver.resolve(&logical, &mut source).await
            };
            tracing::debug!(
                "📁 Serving {} ({}, encoding: {:?})",
                logical,
                content_type,
                encoding.token
            );

            let mut response = content::serve_content(
                method,
                headers,
                Content {
                    file,
                    len,
                    modified,
                    content_type,
                    content_encoding: encoding.content_encoding(),
                },
            )
            .await;
            response
                .headers_mut()
                .insert(VARY, HeaderValue::from_static("accept-encoding"));
            return response;
        }

        tracing::debug!("No servable variant for {}", logical);
        not_found()
    }

    /// Open `logical + suffix` under the root. Directories count as misses.
    async fn open_candidate(
        &self,
        logical: &str,
        encoding: &Encoding,
    ) -> Option<(File, u64, Option<std::time::SystemTime>)> {
        let mut path = self.config.root.clone();
        path.push(format!("{}{}", logical.trim_start_matches('/'), encoding.suffix));

        let file = File::open(&path).await.ok()?;
        let metadata = file.metadata().await.ok()?;
        if metadata.is_dir() {
            return None;
        }
        Some((file, metadata.len(), metadata.modified().ok()))
    }
}

/// An artifact whose head is decoded before type detection, so sniffing
/// sees the asset rather than the compression container
struct EncodedSource<'a> {
    file: &'a mut File,
    encoding: &'static Encoding,
}

#[async_trait]
impl<'a> ContentSource for EncodedSource<'a> {
    async fn head(&mut self, limit: usize) -> io::Result<Vec<u8>> {
        let raw = self.file.head(ENCODED_HEAD_LEN).await?;
        let decoded = match *self.encoding {
            Encoding::BROTLI => decode_prefix(brotli::Decompressor::new(&raw[..], 4096), limit),
            Encoding::GZIP => decode_prefix(flate2::read::GzDecoder::new(&raw[..]), limit),
            _ => raw.into_iter().take(limit).collect(),
        };
        Ok(decoded)
    }
}

/// Decode as much as a truncated stream allows
fn decode_prefix<R: Read>(decoder: R, limit: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(limit);
    if let Err(e) = decoder.take(limit as u64).read_to_end(&mut out) {
        tracing::trace!("Partial decode stopped after {} bytes: {}", out.len(), e);
    }
    out
}

/// Create not found response
pub fn not_found() -> Response<Body> {
    let mut response = Response::new(content::full("404 page not found\n"));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Turn a raw request path into a clean logical path.
///
/// Percent-decodes, enforces a leading `/`, collapses `.`, `..` and empty
/// segments without climbing above the root, and maps `/` to the index
/// file. Returns `None` for paths that cannot name a file.
pub fn normalize_path(raw: &str, index: &str) -> Option<String> {
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    if decoded.contains('\0') || decoded.contains('\\') {
        return None;
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Some(format!("/{}", index));
    }
    Some(format!("/{}", segments.join("/")))
}
