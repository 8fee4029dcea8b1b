//! Cheap, offline URL plausibility check.
//!
//! Generated text invents URLs freely, so every candidate passes through here
//! before anything spends a network round-trip on it.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Root domains accepted without further shape checks (exact or any subdomain).
const TRUSTED_DOMAINS: &[&str] = &[
    "wikipedia.org",
    "britannica.com",
    "github.com",
    "arxiv.org",
    "nature.com",
    "science.org",
    "sciencedirect.com",
    "springer.com",
    "nih.gov",
    "ncbi.nlm.nih.gov",
    "who.int",
    "europa.eu",
    "bbc.co.uk",
    "nytimes.com",
    "theguardian.com",
    "reuters.com",
    "apnews.com",
    "npr.org",
    "hbr.org",
    "mit.edu",
    "stanford.edu",
    "harvard.edu",
    "youtube.com",
    "goodreads.com",
    "amazon.com",
    "imdb.com",
    "ted.com",
    "medium.com",
];

/// Top-level domains a generic hostname may end in.
const ALLOWED_TLDS: &[&str] = &[
    "com", "org", "net", "edu", "gov", "mil", "int", "io", "co", "ai", "app", "dev", "info",
    "biz", "me", "tv", "fm", "news", "blog", "tech", "science", "health", "us", "uk", "ca",
    "au", "nz", "ie", "de", "fr", "es", "it", "nl", "be", "ch", "at", "se", "no", "dk", "fi",
    "pl", "pt", "jp", "kr", "cn", "in", "br", "mx", "za", "eu",
];

/// Stand-in domains, matched against the host and its parents only.
const PLACEHOLDER_DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "example.net",
    "domain.com",
    "website.com",
    "test.com",
    "sample.com",
];

/// Markers of made-up or local URLs, matched anywhere in the URL.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "localhost",
    "127.0.0.1",
    "0.0.0.0",
    "placeholder",
    "yourdomain",
    "yourwebsite",
];

static HOST_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9]+(?:-[a-z0-9]+)*\.)+([a-z]{2,})$").expect("host shape regex is valid")
});

/// Returns `true` when `url` looks like a real, publicly reachable web page address.
///
/// Never panics and never touches the network; anything unparseable is simply `false`.
pub fn validate(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }

    let host = match parsed.host_str() {
        Some(host) if host.len() >= 3 => host.to_ascii_lowercase(),
        _ => return false,
    };

    if !is_trusted_domain(&host) && !has_allowed_shape(&host) {
        return false;
    }

    if PLACEHOLDER_DOMAINS.iter().any(|domain| host_matches(&host, domain)) {
        return false;
    }

    let lowered = url.to_ascii_lowercase();
    if PLACEHOLDER_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return false;
    }

    !url.contains([' ', '<', '>'])
}

/// Returns `true` when `host` equals or is a subdomain of `domain`.
pub fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn is_trusted_domain(host: &str) -> bool {
    TRUSTED_DOMAINS.iter().any(|domain| host_matches(host, domain))
}

fn has_allowed_shape(host: &str) -> bool {
    HOST_SHAPE
        .captures(host)
        .and_then(|caps| caps.get(1))
        .is_some_and(|tld| ALLOWED_TLDS.contains(&tld.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_trusted_domains() {
        assert!(validate("https://en.wikipedia.org/wiki/Stoicism"));
        assert!(validate("https://github.com/rust-lang/rust"));
        assert!(validate("http://www.nature.com/articles/s41586"));
    }

    #[test]
    fn test_accepts_generic_hosts_with_known_tld() {
        assert!(validate("https://www.some-publisher.com/article?id=3"));
        assert!(validate("https://blog.research-lab.io/post"));
    }

    #[test]
    fn test_rejects_unknown_tld() {
        assert!(!validate("https://books.invalidtld/page"));
    }

    #[test]
    fn test_rejects_placeholders() {
        assert!(!validate("https://example.com/article"));
        assert!(!validate("https://blog.test.com/post"));
        assert!(!validate("https://www.yourwebsite.com/about"));
        assert!(!validate("http://localhost:8080/page"));
        assert!(!validate("http://127.0.0.1/page"));
        assert!(!validate("https://placeholder-news.com/story"));
    }

    #[test]
    fn test_rejects_bare_paths_and_other_schemes() {
        assert!(!validate("/wiki/Stoicism"));
        assert!(!validate("wikipedia.org/wiki/Stoicism"));
        assert!(!validate("ftp://ftp.gnu.org/gnu"));
        assert!(!validate("mailto:someone@nature.com"));
    }

    #[test]
    fn test_rejects_spaces_and_angle_brackets() {
        assert!(!validate(" https://www.nature.com/articles"));
        assert!(!validate("https://www.nature.com/<articles>"));
        assert!(!validate("not a url at all"));
    }

    #[test]
    fn test_rejects_short_hosts() {
        assert!(!validate("http://a.b"));
    }

    #[test]
    fn test_host_matches_subdomains_only_on_label_boundary() {
        assert!(host_matches("excluded.com", "excluded.com"));
        assert!(host_matches("sub.excluded.com", "excluded.com"));
        assert!(!host_matches("notexcluded.com", "excluded.com"));
    }

    #[test]
    fn test_hosts_ending_like_placeholders_are_real() {
        assert!(validate("https://www.latest.com/news"));
        assert!(validate("https://www.mywebsite.com/"));
        assert!(validate("https://www.freedomain.com/blog"));
    }
}
