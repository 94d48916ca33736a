//! File name predicates selecting what gets compressed

use assetpress_core::{Error, Result};
use regex::Regex;

/// Suffixes matched by [`MatchRule::web_assets`]
pub const WEB_EXTENSIONS: [&str; 10] = [
    "js", "css", "html", "json", "svg", "ico", "eot", "otf", "ttf", "woff",
];

/// Predicate over a file name selecting files eligible for compression.
///
/// The pattern is searched against the file name only, never the full path,
/// so directory names cannot cause a match.
#[derive(Debug, Clone)]
pub struct MatchRule {
    regex: Regex,
}

impl MatchRule {
    /// Compile a rule from a regular expression
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::InvalidPattern(format!("{}: {}", pattern, e)))?;
        Ok(Self { regex })
    }

    /// Match names ending in any of the given suffixes.
    ///
    /// Suffixes are taken literally; `"js"` matches `app.js` but also
    /// `app.cjs`, while `".js"` only matches a real `.js` extension.
    pub fn from_suffixes<I, S>(suffixes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives: Vec<String> = suffixes
            .into_iter()
            .map(|s| regex::escape(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();

        if alternatives.is_empty() {
            return Err(Error::InvalidPattern("empty suffix list".to_string()));
        }

        Self::new(&format!("(?:{})$", alternatives.join("|")))
    }

    /// Rule for common web server assets
    pub fn web_assets() -> Self {
        Self::from_suffixes(WEB_EXTENSIONS).expect("web asset suffixes form a valid pattern")
    }

    /// Whether a file name is selected by this rule
    pub fn is_match(&self, file_name: &str) -> bool {
        self.regex.is_match(file_name)
    }

    /// The underlying pattern
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_assets() {
        let rule = MatchRule::web_assets();
        for name in ["app.js", "site.css", "index.html", "data.json", "logo.svg", "favicon.ico"] {
            assert!(rule.is_match(name), "{name} should match");
        }
        for name in ["font.eot", "font.otf", "font.ttf", "font.woff"] {
            assert!(rule.is_match(name), "{name} should match");
        }
        for name in ["photo.png", "app.js.gz", "app.js.br", "font.woff2", "README"] {
            assert!(!rule.is_match(name), "{name} should not match");
        }
    }

    #[test]
    fn test_suffixes_are_escaped() {
        let rule = MatchRule::from_suffixes([".map"]).unwrap();
        assert!(rule.is_match("app.js.map"));
        assert!(!rule.is_match("appxmap"));
    }

    #[test]
    fn test_empty_suffixes_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(MatchRule::from_suffixes(empty), Err(Error::InvalidPattern(_))));
        assert!(MatchRule::from_suffixes([""]).is_err());
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(MatchRule::new("(js"), Err(Error::InvalidPattern(_))));
    }

    #[test]
    fn test_custom_regex() {
        let rule = MatchRule::new(r"^bundle\.").unwrap();
        assert!(rule.is_match("bundle.min.js"));
        assert!(!rule.is_match("vendor.bundle.js"));
        assert_eq!(rule.as_str(), r"^bundle\.");
    }
}
