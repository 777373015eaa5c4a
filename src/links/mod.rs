//! Link extraction and classification.
//!
//! Finds every `http`/`https` URL in a post and flags the ones that point at
//! Telegram's own short-link domains. Internal links never reach the
//! shortening API.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+").expect("static URL regex"));

/// Hosts (and their subdomains) that belong to the messaging platform.
const INTERNAL_HOSTS: &[&str] = &["t.me", "telegram.me", "telegram.dog"];

/// One URL occurrence found in a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    /// The URL exactly as it appears in the text.
    pub raw: String,
    /// Whether the URL points at the platform itself.
    pub internal: bool,
}

impl ExtractedLink {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            internal: is_internal_link(raw),
        }
    }
}

/// Extract URLs from text in order of appearance.
///
/// A URL is `http://` or `https://` followed by everything up to the next
/// whitespace. Repeated URLs appear once per occurrence.
pub fn extract_links(text: &str) -> Vec<String> {
    URL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Extract and classify every URL in `text`.
pub fn scan(text: &str) -> Vec<ExtractedLink> {
    URL_RE
        .find_iter(text)
        .map(|m| ExtractedLink::new(m.as_str()))
        .collect()
}

/// Returns `true` when the URL's host is a platform short-link domain.
///
/// Unparseable URLs are treated as external.
pub fn is_internal_link(link: &str) -> bool {
    let Ok(url) = Url::parse(link) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    INTERNAL_HOSTS.iter().any(|internal| {
        host == *internal
            || host
                .strip_suffix(internal)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_in_order() {
        let text = "Check out https://example.com and http://rust-lang.org for more info.";
        assert_eq!(
            extract_links(text),
            vec!["https://example.com", "http://rust-lang.org"]
        );
    }

    #[test]
    fn test_extract_keeps_duplicates() {
        let text = "https://a.io/x then https://a.io/x again";
        assert_eq!(extract_links(text), vec!["https://a.io/x", "https://a.io/x"]);
    }

    #[test]
    fn test_extract_stops_at_whitespace_only() {
        let text = "go https://a.io/path?q=1&r=(2),\nnext\thttps://b.io";
        assert_eq!(
            extract_links(text),
            vec!["https://a.io/path?q=1&r=(2),", "https://b.io"]
        );
    }

    #[test]
    fn test_extract_nothing() {
        assert!(extract_links("").is_empty());
        assert!(extract_links("no links here, just www.example.com").is_empty());
        assert!(extract_links("ftp://files.example.com").is_empty());
    }

    #[test]
    fn test_extract_embedded_scheme() {
        // Scheme is matched wherever it starts, like a plain text scan.
        assert_eq!(extract_links("(https://a.io)"), vec!["https://a.io)"]);
    }

    #[test]
    fn test_internal_hosts() {
        assert!(is_internal_link("https://t.me/somechannel/42"));
        assert!(is_internal_link("http://telegram.me/joinchat/abc"));
        assert!(is_internal_link("https://T.ME/Upper"));
        assert!(is_internal_link("https://addemoji.t.me/pack"));
        assert!(is_internal_link("https://telegram.dog/bot"));
    }

    #[test]
    fn test_external_hosts() {
        assert!(!is_internal_link("https://example.com/t.me"));
        assert!(!is_internal_link("https://bit.me/abc"));
        assert!(!is_internal_link("https://nott.me/abc"));
        assert!(!is_internal_link("https://telegram.org/blog"));
        assert!(!is_internal_link("https://"));
    }

    #[test]
    fn test_scan_classifies_each_occurrence() {
        let links = scan("a https://t.me/x b https://example.com c https://t.me/x");
        assert_eq!(links.len(), 3);
        assert!(links[0].internal);
        assert!(!links[1].internal);
        assert!(links[2].internal);
        assert_eq!(links[1].raw, "https://example.com");
    }
}
