//! Directory-wide pre-compression

use crate::encoder::{Algorithm, BrotliMode};
use crate::matcher::MatchRule;
use assetpress_core::config::CompressConfig;
use assetpress_core::{Error, Result};
use std::fs::{self, File, Metadata};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// When an existing artifact is considered good enough
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactPolicy {
    /// Only write artifacts that do not exist yet. Edited sources keep
    /// their old artifacts until those are deleted.
    #[default]
    IfMissing,
    /// Also rewrite artifacts older than their source
    RefreshStale,
}

/// Walks a directory tree and writes compressed siblings for matched files
#[derive(Debug, Clone)]
pub struct Compressor {
    rule: MatchRule,
    policy: ArtifactPolicy,
}

impl Compressor {
    /// Create a compressor for a match rule
    pub fn new(rule: MatchRule) -> Self {
        Self {
            rule,
            policy: ArtifactPolicy::default(),
        }
    }

    /// Build a compressor from config: explicit pattern, suffix list, or
    /// the web asset default
    pub fn from_config(config: &CompressConfig) -> Result<Self> {
        let rule = match (&config.pattern, &config.extensions) {
            (Some(pattern), _) => MatchRule::new(pattern)?,
            (None, Some(extensions)) => MatchRule::from_suffixes(extensions)?,
            (None, None) => MatchRule::web_assets(),
        };
        let policy = if config.refresh_stale {
            ArtifactPolicy::RefreshStale
        } else {
            ArtifactPolicy::IfMissing
        };
        Ok(Self::new(rule).with_policy(policy))
    }

    /// Set the artifact policy
    pub fn with_policy(mut self, policy: ArtifactPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Compress every matched file under `root`.
    ///
    /// Returns the matched source paths in traversal order. Any error aborts
    /// the run; matches are collected before the first artifact is written.
    pub fn run(&self, root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let root = root.as_ref();
        if !fs::metadata(root)?.is_dir() {
            return Err(Error::NotADirectory(root.to_path_buf()));
        }

        let matches = self.collect(root)?;

        let mut written = 0;
        for source in &matches {
            written += self.ensure_artifacts(source)?;
        }

        tracing::info!(
            "🗜️ Matched {} file(s) under {} ({} artifact(s) written)",
            matches.len(),
            root.display(),
            written
        );
        Ok(matches)
    }

    fn collect(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut matches = Vec::new();

        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                Error::Io(io::Error::new(
                    e.io_error().map(|io| io.kind()).unwrap_or(io::ErrorKind::Other),
                    format!("walking {}: {}", path, e),
                ))
            })?;

            if entry.file_type().is_dir() {
                continue;
            }
            if !self.rule.is_match(&entry.file_name().to_string_lossy()) {
                continue;
            }

            // symlinks are served through, so compress what they point at
            if entry.path_is_symlink() && !entry.path().is_file() {
                tracing::debug!("Skipping {}: not a link to a file", entry.path().display());
                continue;
            }
            matches.push(entry.into_path());
        }

        Ok(matches)
    }

    /// Write whichever artifacts `source` is missing, returning how many
    fn ensure_artifacts(&self, source: &Path) -> Result<usize> {
        if is_artifact(source) {
            tracing::debug!("Skipping already compressed {}", source.display());
            return Ok(0);
        }

        let source_meta = fs::metadata(source)?;
        let mode = BrotliMode::for_file_name(
            &source.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
        );

        let mut written = 0;
        for algorithm in Algorithm::ALL {
            let artifact = algorithm.artifact_path(source);
            let Some(replace) = self.needs_artifact(&source_meta, &artifact)? else {
                continue;
            };
            write_artifact(algorithm, mode, source, &source_meta, &artifact, replace)?;
            tracing::debug!("Wrote {}", artifact.display());
            written += 1;
        }
        Ok(written)
    }

    /// `None` to keep the artifact, `Some(replace)` to write it
    fn needs_artifact(&self, source_meta: &Metadata, artifact: &Path) -> Result<Option<bool>> {
        match fs::symlink_metadata(artifact) {
            Ok(meta) => match self.policy {
                ArtifactPolicy::IfMissing => Ok(None),
                ArtifactPolicy::RefreshStale if is_stale(source_meta, &meta) => {
                    tracing::debug!("Refreshing stale {}", artifact.display());
                    Ok(Some(true))
                }
                ArtifactPolicy::RefreshStale => Ok(None),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Some(false)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Compress all files under `root` whose name matches `rule`
pub fn compress_files(root: impl AsRef<Path>, rule: &MatchRule) -> Result<Vec<PathBuf>> {
    Compressor::new(rule.clone()).run(root)
}

/// Compress common web server assets under `root`
pub fn compress_webserver_files(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    Compressor::new(MatchRule::web_assets()).run(root)
}

fn is_artifact(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("gz" | "br"))
}

fn is_stale(source: &Metadata, artifact: &Metadata) -> bool {
    match (source.modified(), artifact.modified()) {
        (Ok(source), Ok(artifact)) => artifact < source,
        _ => false,
    }
}

/// Encode into a temp file beside the artifact, then move it into place.
///
/// A failed encode leaves nothing behind. Without `replace` an artifact
/// created concurrently by someone else is kept.
fn write_artifact(
    algorithm: Algorithm,
    mode: BrotliMode,
    source: &Path,
    source_meta: &Metadata,
    artifact: &Path,
    replace: bool,
) -> Result<()> {
    let dir = artifact.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".assetpress-")
        .tempfile_in(dir)?;

    {
        let mut input = BufReader::new(File::open(source)?);
        let mut output = BufWriter::new(tmp.as_file_mut());
        algorithm.encode(mode, &mut input, &mut output)?;
        output.flush()?;
    }
    fs::set_permissions(tmp.path(), source_meta.permissions())?;

    if replace {
        tmp.persist(artifact).map_err(|e| e.error)?;
    } else {
        match tmp.persist_noclobber(artifact) {
            Ok(_) => {}
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!("{} appeared concurrently, keeping it", artifact.display());
            }
            Err(e) => return Err(e.error.into()),
        }
    }
    Ok(())
}
