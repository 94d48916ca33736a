//! MIME type handling
//!
//! Content types are resolved once per logical path and then served from a
//! shared cache. Resolution tries a fixed list of detectors in order and
//! stops at the first answer:
//!
//! 1. the file extension (`mime_guess`)
//! 2. binary signatures in the leading bytes
//! 3. text/HTML/binary sniffing of the leading bytes, which always answers
//!
//! File contents are only read when the extension gives no answer.

use crate::sniff::{self, OCTET_STREAM, SNIFF_LEN};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::{self, SeekFrom};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Get MIME type for a path's extension.
///
/// `text/*` types gain an explicit UTF-8 charset.
pub fn guess_mime_type(path: &str) -> Option<String> {
    let mime = mime_guess::from_path(path).first_raw()?;
    if mime.starts_with("text/") {
        Some(format!("{}; charset=utf-8", mime))
    } else {
        Some(mime.to_string())
    }
}

/// Something whose leading bytes can be inspected
#[async_trait]
pub trait ContentSource: Send {
    /// Read up to `limit` bytes from the start.
    ///
    /// Implementations must leave the source positioned at the start again.
    async fn head(&mut self, limit: usize) -> io::Result<Vec<u8>>;
}

#[async_trait]
impl ContentSource for tokio::fs::File {
    async fn head(&mut self, limit: usize) -> io::Result<Vec<u8>> {
        self.seek(SeekFrom::Start(0)).await?;
        let mut buf = Vec::with_capacity(limit);
        (&mut *self).take(limit as u64).read_to_end(&mut buf).await?;
        self.seek(SeekFrom::Start(0)).await?;
        Ok(buf)
    }
}

#[async_trait]
impl<'a> ContentSource for &'a [u8] {
    async fn head(&mut self, limit: usize) -> io::Result<Vec<u8>> {
        Ok(self[..self.len().min(limit)].to_vec())
    }
}

/// One step of the resolution chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detector {
    /// Extension-to-MIME table
    Extension,
    /// Magic numbers
    Signature,
    /// Byte-pattern heuristics
    Sniff,
}

impl Detector {
    /// The default chain
    pub const CHAIN: [Detector; 3] = [Detector::Extension, Detector::Signature, Detector::Sniff];

    /// Whether this detector inspects file contents
    pub fn reads_content(&self) -> bool {
        !matches!(self, Detector::Extension)
    }

    /// Run the detector. `head` is ignored by [`Detector::Extension`].
    pub fn detect(&self, path: &str, head: &[u8]) -> Option<String> {
        match self {
            Detector::Extension => guess_mime_type(path),
            Detector::Signature => sniff::signature(head).map(str::to_string),
            Detector::Sniff => Some(sniff::sniff(head).to_string()),
        }
    }
}

/// Resolved content types keyed by logical path.
///
/// Entries are never evicted; the key space is the served asset tree.
#[derive(Debug, Default)]
pub struct ContentTypeCache {
    entries: RwLock<HashMap<String, String>>,
}

impl ContentTypeCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached type for a path
    pub fn get(&self, path: &str) -> Option<String> {
        self.entries.read().get(path).cloned()
    }

    /// Record a resolved type
    pub fn insert(&self, path: &str, content_type: &str) {
        self.entries
            .write()
            .insert(path.to_string(), content_type.to_string());
    }

    /// Number of cached paths
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been cached yet
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Resolves and caches content types
#[derive(Debug, Clone)]
pub struct ContentTypeResolver {
    cache: Arc<ContentTypeCache>,
    detectors: Vec<Detector>,
}

impl Default for ContentTypeResolver {
    fn default() -> Self {
        Self::new(Arc::new(ContentTypeCache::new()))
    }
}

impl ContentTypeResolver {
    /// Create a resolver writing through to `cache`
    pub fn new(cache: Arc<ContentTypeCache>) -> Self {
        Self {
            cache,
            detectors: Detector::CHAIN.to_vec(),
        }
    }

    /// Replace the detector chain
    pub fn with_detectors(mut self, detectors: Vec<Detector>) -> Self {
        self.detectors = detectors;
        self
    }

    /// The backing cache
    pub fn cache(&self) -> &Arc<ContentTypeCache> {
        &self.cache
    }

    /// Resolve the content type for a logical path. Never fails.
    ///
    /// `source` is only read on a cache miss that the extension cannot
    /// answer, and at most once per call.
    pub async fn resolve<S>(&self, path: &str, source: &mut S) -> String
    where
        S: ContentSource + ?Sized,
    {
        if let Some(content_type) = self.cache.get(path) {
            return content_type;
        }

        let mut head: Option<Vec<u8>> = None;
        for detector in &self.detectors {
            if detector.reads_content() && head.is_none() {
                match source.head(SNIFF_LEN).await {
                    Ok(bytes) => head = Some(bytes),
                    Err(e) => {
                        tracing::debug!("Failed to read {} for type detection: {}", path, e);
                        return OCTET_STREAM.to_string();
                    }
                }
            }

            if let Some(content_type) = detector.detect(path, head.as_deref().unwrap_or_default()) {
                tracing::debug!("Resolved {} as {} ({:?})", path, content_type, detector);
                self.cache.insert(path, &content_type);
                return content_type;
            }
        }

        self.cache.insert(path, OCTET_STREAM);
        OCTET_STREAM.to_string()
    }
}
