//! Content-based MIME detection
//!
//! Two pure passes over the leading bytes of a file: a table of binary
//! signatures, and the text/HTML/binary heuristics of the MIME sniffing
//! algorithm browsers use.

/// Bytes inspected by either pass
pub const SNIFF_LEN: usize = 512;

/// Type reported when nothing better is known
pub const OCTET_STREAM: &str = "application/octet-stream";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// A magic number at a fixed offset
struct Signature {
    offset: usize,
    magic: &'static [u8],
    mime: &'static str,
}

const fn sig(offset: usize, magic: &'static [u8], mime: &'static str) -> Signature {
    Signature { offset, magic, mime }
}

static SIGNATURES: &[Signature] = &[
    // images
    sig(0, b"\x89PNG\r\n\x1a\n", "image/png"),
    sig(0, b"\xff\xd8\xff", "image/jpeg"),
    sig(0, b"GIF87a", "image/gif"),
    sig(0, b"GIF89a", "image/gif"),
    sig(0, b"BM", "image/bmp"),
    sig(0, b"\x00\x00\x01\x00", "image/x-icon"),
    sig(0, b"II*\x00", "image/tiff"),
    sig(0, b"MM\x00*", "image/tiff"),
    sig(4, b"ftypavif", "image/avif"),
    // fonts
    sig(0, b"wOFF", "font/woff"),
    sig(0, b"wOF2", "font/woff2"),
    sig(0, b"OTTO", "font/otf"),
    sig(0, b"\x00\x01\x00\x00\x00", "font/ttf"),
    // audio / video
    sig(0, b"ID3", "audio/mpeg"),
    sig(0, b"fLaC", "audio/flac"),
    sig(0, b"OggS", "audio/ogg"),
    sig(0, b"\x1a\x45\xdf\xa3", "video/webm"),
    sig(4, b"ftyp", "video/mp4"),
    // documents
    sig(0, b"%PDF-", "application/pdf"),
    sig(0, b"\x00asm", "application/wasm"),
    sig(0, b"SQLite format 3\x00", "application/vnd.sqlite3"),
    // archives
    sig(0, b"PK\x03\x04", "application/zip"),
    sig(0, b"\x1f\x8b", "application/gzip"),
    sig(0, b"BZh", "application/x-bzip2"),
    sig(0, b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
    sig(0, b"Rar!\x1a\x07", "application/vnd.rar"),
    sig(0, b"\xfd7zXZ\x00", "application/x-xz"),
    sig(0, b"\x28\xb5\x2f\xfd", "application/zstd"),
    sig(257, b"ustar", "application/x-tar"),
    // executables
    sig(0, b"\x7fELF", "application/x-executable"),
    sig(0, b"MZ", "application/vnd.microsoft.portable-executable"),
];

/// Match leading bytes against known binary signatures
pub fn signature(head: &[u8]) -> Option<&'static str> {
    if let Some(mime) = riff(head) {
        return Some(mime);
    }
    SIGNATURES
        .iter()
        .find(|s| head.get(s.offset..s.offset + s.magic.len()) == Some(s.magic))
        .map(|s| s.mime)
}

/// RIFF containers carry their format at offset 8
fn riff(head: &[u8]) -> Option<&'static str> {
    if !head.starts_with(b"RIFF") {
        return None;
    }
    match head.get(8..12)? {
        b"WEBP" => Some("image/webp"),
        b"WAVE" => Some("audio/wav"),
        b"AVI " => Some("video/x-msvideo"),
        _ => None,
    }
}

/// HTML tags recognized at the start of a document (case-insensitive)
const HTML_TAGS: [&[u8]; 17] = [
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Infer a type from content alone. Always answers.
pub fn sniff(head: &[u8]) -> &'static str {
    let data = &head[..head.len().min(SNIFF_LEN)];

    // byte order marks
    if data.starts_with(b"\xfe\xff") {
        return "text/plain; charset=utf-16be";
    }
    if data.starts_with(b"\xff\xfe") {
        return "text/plain; charset=utf-16le";
    }
    if data.starts_with(b"\xef\xbb\xbf") {
        return TEXT_PLAIN;
    }

    let first = data
        .iter()
        .position(|b| !is_whitespace(*b))
        .unwrap_or(data.len());
    let trimmed = &data[first..];

    if HTML_TAGS.iter().any(|tag| html_tag(trimmed, tag)) {
        return "text/html; charset=utf-8";
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }
    if data.starts_with(b"%PDF-") {
        return "application/pdf";
    }
    if data.starts_with(b"%!PS-Adobe-") {
        return "application/postscript";
    }

    if data.iter().any(|b| is_binary(*b)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

/// Tag name match followed by a space or `>`
fn html_tag(data: &[u8], tag: &[u8]) -> bool {
    if data.len() < tag.len() + 1 {
        return false;
    }
    if !data[..tag.len()].eq_ignore_ascii_case(tag) {
        return false;
    }
    matches!(data[tag.len()], b' ' | b'>')
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f)
}
