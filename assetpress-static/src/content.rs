//! Serving an open file with conditional and range support

use bytes::Bytes;
use futures::TryStreamExt;
use http::header::{
    ACCEPT_RANGES, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderMap,
    HeaderName, HeaderValue, IF_MODIFIED_SINCE, IF_RANGE, IF_UNMODIFIED_SINCE, LAST_MODIFIED,
    RANGE,
};
use http::{Method, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body::Frame;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use httpdate::HttpDate;
use std::io::{self, SeekFrom};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Response body used throughout the file server
pub type Body = BoxBody<Bytes, io::Error>;

/// Body with no content
pub fn empty() -> Body {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

/// Body with fixed content
pub fn full(content: impl Into<Bytes>) -> Body {
    Full::new(content.into()).map_err(|never| match never {}).boxed()
}

/// An opened representation ready to be served
#[derive(Debug)]
pub struct Content {
    pub file: File,
    pub len: u64,
    pub modified: Option<SystemTime>,
    pub content_type: String,
    pub content_encoding: Option<&'static str>,
}

/// Outcome of a Range header against a representation length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// Serve everything
    Full,
    /// Serve `start..=end`
    Partial { start: u64, end: u64 },
    /// Nothing in the range exists
    Unsatisfiable,
}

/// Parse Range header (single `bytes=` spec only).
///
/// Syntactically invalid and multi-range headers are ignored.
pub fn parse_range(header: &str, size: u64) -> ByteRange {
    let Some(spec) = header.trim().strip_prefix("bytes=") else {
        return ByteRange::Full;
    };
    if spec.contains(',') {
        return ByteRange::Full;
    }
    let Some((start, end)) = spec.trim().split_once('-') else {
        return ByteRange::Full;
    };
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        // suffix: last N bytes
        let Ok(suffix) = end.parse::<u64>() else {
            return ByteRange::Full;
        };
        if suffix == 0 || size == 0 {
            return ByteRange::Unsatisfiable;
        }
        return ByteRange::Partial {
            start: size.saturating_sub(suffix),
            end: size - 1,
        };
    }

    let Ok(start) = start.parse::<u64>() else {
        return ByteRange::Full;
    };
    if start >= size {
        return ByteRange::Unsatisfiable;
    }
    let end = if end.is_empty() {
        size - 1
    } else {
        match end.parse::<u64>() {
            Ok(end) if end >= start => end.min(size - 1),
            _ => return ByteRange::Full,
        }
    };

    ByteRange::Partial { start, end }
}

/// HTTP dates have one-second resolution
fn truncate(time: SystemTime) -> SystemTime {
    SystemTime::from(HttpDate::from(time))
}

fn header_date(headers: &HeaderMap, name: HeaderName) -> Option<SystemTime> {
    let date: HttpDate = headers.get(name)?.to_str().ok()?.trim().parse().ok()?;
    Some(date.into())
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

/// Serve `content` for a request, honoring conditional and range headers.
///
/// The body streams from the open file; dropping the response body closes
/// the file.
pub async fn serve_content(
    method: &Method,
    headers: &HeaderMap,
    content: Content,
) -> Response<Body> {
    let Content {
        mut file,
        len,
        modified,
        content_type,
        content_encoding,
    } = content;

    let last_modified = modified.filter(|t| *t > UNIX_EPOCH).map(truncate);

    let mut response = Response::new(empty());
    let response_headers = response.headers_mut();
    if let Some(lm) = last_modified {
        set_header(response_headers, LAST_MODIFIED, &httpdate::fmt_http_date(lm));
    }

    // preconditions
    if let (Some(lm), Some(since)) = (last_modified, header_date(headers, IF_UNMODIFIED_SINCE)) {
        if lm > since {
            *response.status_mut() = StatusCode::PRECONDITION_FAILED;
            return response;
        }
    }
    if *method == Method::GET || *method == Method::HEAD {
        if let (Some(lm), Some(since)) = (last_modified, header_date(headers, IF_MODIFIED_SINCE)) {
            if lm <= since {
                *response.status_mut() = StatusCode::NOT_MODIFIED;
                return response;
            }
        }
    }

    let response_headers = response.headers_mut();
    set_header(response_headers, CONTENT_TYPE, &content_type);
    if let Some(encoding) = content_encoding {
        set_header(response_headers, CONTENT_ENCODING, encoding);
    }
    response_headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let range_allowed = match headers.get(IF_RANGE) {
        None => true,
        Some(_) => matches!(
            (last_modified, header_date(headers, IF_RANGE)),
            (Some(lm), Some(date)) if lm == date
        ),
    };
    let range = match headers.get(RANGE).and_then(|v| v.to_str().ok()) {
        Some(value) if range_allowed => parse_range(value, len),
        _ => ByteRange::Full,
    };

    let (start, length) = match range {
        ByteRange::Full => (0, len),
        ByteRange::Partial { start, end } => {
            *response.status_mut() = StatusCode::PARTIAL_CONTENT;
            set_header(
                response.headers_mut(),
                CONTENT_RANGE,
                &format!("bytes {}-{}/{}", start, end, len),
            );
            (start, end - start + 1)
        }
        ByteRange::Unsatisfiable => {
            *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
            set_header(response.headers_mut(), CONTENT_RANGE, &format!("bytes */{}", len));
            response.headers_mut().remove(CONTENT_TYPE);
            response.headers_mut().remove(CONTENT_ENCODING);
            return response;
        }
    };

    response
        .headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from(length));

    if *method == Method::HEAD {
        return response;
    }

    // the file may have been read from already
    if let Err(e) = file.seek(SeekFrom::Start(start)).await {
        tracing::debug!("Seek failed: {}", e);
        *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
        response.headers_mut().remove(CONTENT_LENGTH);
        return response;
    }

    let stream = ReaderStream::new(file.take(length)).map_ok(Frame::data);
    *response.body_mut() = StreamBody::new(stream).boxed();
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("bytes=0-4", 10), ByteRange::Partial { start: 0, end: 4 });
        assert_eq!(parse_range("bytes=5-", 10), ByteRange::Partial { start: 5, end: 9 });
        assert_eq!(parse_range("bytes=-3", 10), ByteRange::Partial { start: 7, end: 9 });
        assert_eq!(parse_range("bytes=-30", 10), ByteRange::Partial { start: 0, end: 9 });
        assert_eq!(parse_range("bytes=2-100", 10), ByteRange::Partial { start: 2, end: 9 });
    }

    #[test]
    fn test_parse_range_ignored() {
        assert_eq!(parse_range("items=0-4", 10), ByteRange::Full);
        assert_eq!(parse_range("bytes=0-1,4-5", 10), ByteRange::Full);
        assert_eq!(parse_range("bytes=abc", 10), ByteRange::Full);
        assert_eq!(parse_range("bytes=5-2", 10), ByteRange::Full);
    }

    #[test]
    fn test_parse_range_unsatisfiable() {
        assert_eq!(parse_range("bytes=10-", 10), ByteRange::Unsatisfiable);
        assert_eq!(parse_range("bytes=-0", 10), ByteRange::Unsatisfiable);
        assert_eq!(parse_range("bytes=0-", 0), ByteRange::Unsatisfiable);
    }

    async fn content(dir: &std::path::Path, data: &[u8]) -> Content {
        let path = dir.join("file.txt");
        std::fs::write(&path, data).unwrap();
        let file = File::open(&path).await.unwrap();
        let meta = file.metadata().await.unwrap();
        Content {
            file,
            len: meta.len(),
            modified: meta.modified().ok(),
            content_type: "text/plain; charset=utf-8".to_string(),
            content_encoding: Some("gzip"),
        }
    }

    async fn body_bytes(response: Response<Body>) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    #[tokio::test]
    async fn test_full_response() {
        let dir = tempfile::tempdir().unwrap();
        let c = content(dir.path(), b"hello world").await;

        let response = serve_content(&Method::GET, &HeaderMap::new(), c).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_LENGTH], "11");
        assert_eq!(response.headers()[CONTENT_ENCODING], "gzip");
        assert_eq!(response.headers()[ACCEPT_RANGES], "bytes");
        assert!(response.headers().contains_key(LAST_MODIFIED));
        assert_eq!(body_bytes(response).await, b"hello world");
    }

    #[tokio::test]
    async fn test_body_starts_at_offset_despite_file_position() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = content(dir.path(), b"hello world").await;
        let mut skipped = [0u8; 6];
        c.file.read_exact(&mut skipped).await.unwrap();

        let response = serve_content(&Method::GET, &HeaderMap::new(), c).await;

        assert_eq!(response.headers()[CONTENT_LENGTH], "11");
        assert_eq!(body_bytes(response).await, b"hello world");
    }

    #[tokio::test]
    async fn test_head_has_no_body() {
        let dir = tempfile::tempdir().unwrap();
        let c = content(dir.path(), b"hello world").await;

        let response = serve_content(&Method::HEAD, &HeaderMap::new(), c).await;

        assert_eq!(response.headers()[CONTENT_LENGTH], "11");
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_partial_content() {
        let dir = tempfile::tempdir().unwrap();
        let c = content(dir.path(), b"hello world").await;
        let mut headers = HeaderMap::new();
        headers.insert(RANGE, HeaderValue::from_static("bytes=6-"));

        let response = serve_content(&Method::GET, &headers, c).await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[CONTENT_RANGE], "bytes 6-10/11");
        assert_eq!(response.headers()[CONTENT_LENGTH], "5");
        assert_eq!(body_bytes(response).await, b"world");
    }

    #[tokio::test]
    async fn test_range_not_satisfiable() {
        let dir = tempfile::tempdir().unwrap();
        let c = content(dir.path(), b"hello").await;
        let mut headers = HeaderMap::new();
        headers.insert(RANGE, HeaderValue::from_static("bytes=50-"));

        let response = serve_content(&Method::GET, &headers, c).await;

        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[CONTENT_RANGE], "bytes */5");
    }

    #[tokio::test]
    async fn test_not_modified() {
        let dir = tempfile::tempdir().unwrap();
        let c = content(dir.path(), b"hello").await;
        let since = httpdate::fmt_http_date(SystemTime::now() + Duration::from_secs(60));
        let mut headers = HeaderMap::new();
        headers.insert(IF_MODIFIED_SINCE, HeaderValue::from_str(&since).unwrap());

        let response = serve_content(&Method::GET, &headers, c).await;

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_modified_since_old_date() {
        let dir = tempfile::tempdir().unwrap();
        let c = content(dir.path(), b"hello").await;
        let mut headers = HeaderMap::new();
        headers.insert(
            IF_MODIFIED_SINCE,
            HeaderValue::from_static("Sun, 06 Nov 1994 08:49:37 GMT"),
        );

        let response = serve_content(&Method::GET, &headers, c).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"hello");
    }

    #[tokio::test]
    async fn test_precondition_failed() {
        let dir = tempfile::tempdir().unwrap();
        let c = content(dir.path(), b"hello").await;
        let mut headers = HeaderMap::new();
        headers.insert(
            IF_UNMODIFIED_SINCE,
            HeaderValue::from_static("Sun, 06 Nov 1994 08:49:37 GMT"),
        );

        let response = serve_content(&Method::GET, &headers, c).await;

        assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    }

    #[tokio::test]
    async fn test_if_range_mismatch_serves_full() {
        let dir = tempfile::tempdir().unwrap();
        let c = content(dir.path(), b"hello world").await;
        let mut headers = HeaderMap::new();
        headers.insert(RANGE, HeaderValue::from_static("bytes=0-4"));
        headers.insert(IF_RANGE, HeaderValue::from_static("Sun, 06 Nov 1994 08:49:37 GMT"));

        let response = serve_content(&Method::GET, &headers, c).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"hello world");
    }
}
