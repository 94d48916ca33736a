//! Artifact encoders

use brotli::enc::backward_references::BrotliEncoderMode;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Maximum brotli quality
const BROTLI_QUALITY: i32 = 11;
/// Brotli window size (4MB)
const BROTLI_LGWIN: i32 = 22;

/// Supported artifact algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Gzip,
    Brotli,
}

impl Algorithm {
    /// Every algorithm, in the order artifacts are written
    pub const ALL: [Algorithm; 2] = [Algorithm::Gzip, Algorithm::Brotli];

    /// Get the content-encoding header value
    pub fn encoding(&self) -> &'static str {
        match self {
            Algorithm::Gzip => "gzip",
            Algorithm::Brotli => "br",
        }
    }

    /// Suffix appended to the source path
    pub fn suffix(&self) -> &'static str {
        match self {
            Algorithm::Gzip => ".gz",
            Algorithm::Brotli => ".br",
        }
    }

    /// Sibling artifact path for a source file
    pub fn artifact_path(&self, source: &Path) -> PathBuf {
        let mut path = source.as_os_str().to_owned();
        path.push(self.suffix());
        PathBuf::from(path)
    }

    /// Encode `input` into `output` at maximum compression
    pub fn encode<R, W>(&self, mode: BrotliMode, input: &mut R, output: &mut W) -> io::Result<()>
    where
        R: Read,
        W: Write,
    {
        match self {
            Algorithm::Gzip => {
                let mut encoder = GzEncoder::new(output, Compression::best());
                io::copy(input, &mut encoder)?;
                encoder.finish()?;
            }
            Algorithm::Brotli => {
                let params = brotli::enc::BrotliEncoderParams {
                    quality: BROTLI_QUALITY,
                    lgwin: BROTLI_LGWIN,
                    mode: mode.into(),
                    ..Default::default()
                };
                brotli::BrotliCompress(input, output, &params)?;
            }
        }
        Ok(())
    }
}

/// Brotli tuning chosen from the source file's class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrotliMode {
    #[default]
    Generic,
    Text,
    Font,
}

impl BrotliMode {
    const TEXT_SUFFIXES: [&'static str; 6] = [".js", ".css", ".html", ".json", ".svg", ".ico"];
    const FONT_SUFFIXES: [&'static str; 4] = [".eot", ".otf", ".ttf", ".woff"];

    /// Pick the mode for a file name
    pub fn for_file_name(name: &str) -> Self {
        if Self::TEXT_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            BrotliMode::Text
        } else if Self::FONT_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            BrotliMode::Font
        } else {
            BrotliMode::Generic
        }
    }
}

impl From<BrotliMode> for BrotliEncoderMode {
    fn from(mode: BrotliMode) -> Self {
        match mode {
            BrotliMode::Generic => BrotliEncoderMode::BROTLI_MODE_GENERIC,
            BrotliMode::Text => BrotliEncoderMode::BROTLI_MODE_TEXT,
            BrotliMode::Font => BrotliEncoderMode::BROTLI_MODE_FONT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_brotli_mode_selection() {
        assert_eq!(BrotliMode::for_file_name("app.js"), BrotliMode::Text);
        assert_eq!(BrotliMode::for_file_name("index.html"), BrotliMode::Text);
        assert_eq!(BrotliMode::for_file_name("favicon.ico"), BrotliMode::Text);
        assert_eq!(BrotliMode::for_file_name("font.woff"), BrotliMode::Font);
        assert_eq!(BrotliMode::for_file_name("font.ttf"), BrotliMode::Font);
        assert_eq!(BrotliMode::for_file_name("logo.svg"), BrotliMode::Text);
        assert_eq!(BrotliMode::for_file_name("photo.png"), BrotliMode::Generic);
        assert_eq!(BrotliMode::for_file_name("font.woff2"), BrotliMode::Generic);
    }

    #[test]
    fn test_artifact_path() {
        let source = Path::new("/srv/www/app.min.js");
        assert_eq!(Algorithm::Gzip.artifact_path(source), PathBuf::from("/srv/www/app.min.js.gz"));
        assert_eq!(
            Algorithm::Brotli.artifact_path(source),
            PathBuf::from("/srv/www/app.min.js.br")
        );
    }

    #[test]
    fn test_gzip_encode() {
        let input = b"body { color: red; } ".repeat(64);
        let mut out = Vec::new();
        Algorithm::Gzip
            .encode(BrotliMode::Text, &mut Cursor::new(&input), &mut out)
            .unwrap();

        let mut decoded = Vec::new();
        flate2::read::GzDecoder::new(&out[..]).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, input);
        assert!(out.len() < input.len());
    }

    #[test]
    fn test_brotli_encode() {
        let input = b"console.log('hello');\n".repeat(64);
        let mut out = Vec::new();
        Algorithm::Brotli
            .encode(BrotliMode::Text, &mut Cursor::new(&input), &mut out)
            .unwrap();

        let mut decoded = Vec::new();
        brotli::Decompressor::new(&out[..], 4096).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn test_encode_empty_input() {
        for algorithm in Algorithm::ALL {
            let mut out = Vec::new();
            algorithm
                .encode(BrotliMode::Generic, &mut Cursor::new(Vec::new()), &mut out)
                .unwrap();
            assert!(!out.is_empty());
        }
    }
}
