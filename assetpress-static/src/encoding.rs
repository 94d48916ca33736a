//! Encoding catalog and Accept-Encoding negotiation

use http::HeaderMap;
use http::header::ACCEPT_ENCODING;

/// A servable representation: header token plus the file suffix holding it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    /// `Content-Encoding` token, empty for identity
    pub token: &'static str,
    /// Suffix appended to the logical path, empty for identity
    pub suffix: &'static str,
}

impl Encoding {
    pub const BROTLI: Encoding = Encoding { token: "br", suffix: ".br" };
    pub const GZIP: Encoding = Encoding { token: "gzip", suffix: ".gz" };
    pub const IDENTITY: Encoding = Encoding { token: "", suffix: "" };

    /// Whether this is the uncompressed fallback
    pub fn is_identity(&self) -> bool {
        self.token.is_empty()
    }

    /// Value for the `Content-Encoding` header, if one should be sent
    pub fn content_encoding(&self) -> Option<&'static str> {
        (!self.is_identity()).then_some(self.token)
    }
}

/// Encodings in serving precedence: best compression first, identity last
pub static CATALOG: [Encoding; 3] = [Encoding::BROTLI, Encoding::GZIP, Encoding::IDENTITY];

/// One `token;q=value` entry of an Accept-Encoding header
#[derive(Debug, Clone, PartialEq)]
pub struct QualityItem {
    pub token: String,
    pub quality: f32,
}

/// Parsed Accept-Encoding preferences
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcceptEncoding {
    items: Vec<QualityItem>,
}

impl AcceptEncoding {
    /// Parse every Accept-Encoding line of a request
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut items = Vec::new();
        for value in headers.get_all(ACCEPT_ENCODING) {
            if let Ok(value) = value.to_str() {
                items.extend(Self::parse(value).items);
            }
        }
        Self { items }
    }

    /// Parse a single header value.
    ///
    /// Entries with a malformed quality are dropped; tokens are lowercased.
    pub fn parse(value: &str) -> Self {
        let items = value
            .split(',')
            .filter_map(|entry| {
                let mut parts = entry.split(';');
                let token = parts.next()?.trim().to_ascii_lowercase();
                if token.is_empty() {
                    return None;
                }

                let mut quality: f32 = 1.0;
                for param in parts {
                    let Some((name, value)) = param.split_once('=') else {
                        continue;
                    };
                    if name.trim().eq_ignore_ascii_case("q") {
                        quality = value.trim().parse::<f32>().ok().filter(|q| q.is_finite())?;
                    }
                }

                Some(QualityItem {
                    token,
                    quality: quality.clamp(0.0, 1.0),
                })
            })
            .collect();

        Self { items }
    }

    /// No preferences were expressed
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Parsed entries in header order
    pub fn items(&self) -> &[QualityItem] {
        &self.items
    }

    /// Whether the client lists `token` (or `*`) with a non-zero quality.
    ///
    /// An explicit entry for the token wins over a wildcard.
    pub fn accepts(&self, token: &str) -> bool {
        let explicit = self
            .items
            .iter()
            .filter(|item| item.token == token)
            .map(|item| item.quality)
            .reduce(f32::max);

        match explicit {
            Some(quality) => quality > 0.0,
            None => self
                .items
                .iter()
                .any(|item| item.token == "*" && item.quality > 0.0),
        }
    }

    /// Whether a catalog entry may be tried for this client.
    ///
    /// With no preferences every encoding is tried, favoring bandwidth over
    /// strict negotiation. Identity is always eligible as the last resort.
    pub fn is_eligible(&self, encoding: &Encoding) -> bool {
        self.is_empty() || encoding.is_identity() || self.accepts(encoding.token)
    }

    /// Eligible catalog entries in precedence order
    pub fn candidates(&self) -> impl Iterator<Item = &'static Encoding> + '_ {
        CATALOG.iter().filter(move |encoding| self.is_eligible(encoding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn tokens(accept: &AcceptEncoding) -> Vec<&'static str> {
        accept.candidates().map(|e| e.token).collect()
    }

    #[test]
    fn test_catalog_order() {
        let tokens: Vec<_> = CATALOG.iter().map(|e| e.token).collect();
        assert_eq!(tokens, vec!["br", "gzip", ""]);
        assert_eq!(CATALOG[2].content_encoding(), None);
        assert_eq!(CATALOG[0].content_encoding(), Some("br"));
    }

    #[test]
    fn test_parse_qualities() {
        let accept = AcceptEncoding::parse("gzip;q=0.8, BR, deflate ; q=0");
        assert_eq!(
            accept.items(),
            &[
                QualityItem { token: "gzip".into(), quality: 0.8 },
                QualityItem { token: "br".into(), quality: 1.0 },
                QualityItem { token: "deflate".into(), quality: 0.0 },
            ]
        );
    }

    #[test]
    fn test_malformed_quality_dropped() {
        let accept = AcceptEncoding::parse("gzip;q=abc, br");
        assert_eq!(accept.items().len(), 1);
        assert_eq!(accept.items()[0].token, "br");
    }

    #[test]
    fn test_precedence_ignores_quality() {
        let accept = AcceptEncoding::parse("gzip;q=1.0, br;q=0.1");
        assert_eq!(tokens(&accept), vec!["br", "gzip", ""]);
    }

    #[test]
    fn test_quality_zero_excluded() {
        let accept = AcceptEncoding::parse("gzip;q=0");
        assert_eq!(tokens(&accept), vec![""]);
    }

    #[test]
    fn test_empty_tries_everything() {
        assert_eq!(tokens(&AcceptEncoding::parse("")), vec!["br", "gzip", ""]);
        assert_eq!(tokens(&AcceptEncoding::default()), vec!["br", "gzip", ""]);
    }

    #[test]
    fn test_unknown_tokens_only_identity() {
        let accept = AcceptEncoding::parse("deflate, zstd");
        assert_eq!(tokens(&accept), vec![""]);
    }

    #[test]
    fn test_wildcard() {
        assert_eq!(tokens(&AcceptEncoding::parse("*")), vec!["br", "gzip", ""]);
        assert_eq!(tokens(&AcceptEncoding::parse("*, gzip;q=0")), vec!["br", ""]);
        assert_eq!(tokens(&AcceptEncoding::parse("*;q=0, gzip")), vec!["gzip", ""]);
    }

    #[test]
    fn test_from_multiple_header_lines() {
        let mut headers = HeaderMap::new();
        headers.append(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        headers.append(ACCEPT_ENCODING, HeaderValue::from_static("br;q=0"));
        let accept = AcceptEncoding::from_headers(&headers);
        assert_eq!(tokens(&accept), vec!["gzip", ""]);
    }
}
