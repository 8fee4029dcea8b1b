//! Soft-404 and paywall detection over fetched page markup.
//!
//! Plenty of dead or gated pages still answer `200 OK`; the only signal left is
//! the text itself. The checks here are heuristics: a legitimate article that
//! says "oops" will be flagged, and a dead page with novel wording will not.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Phrases that mark a page as missing, moved, gated or broken on any site.
const GENERIC_PHRASES: &[&str] = &[
    "page not found",
    "404 not found",
    "error 404",
    "404 error",
    "not found on this server",
    "page doesn't exist",
    "page does not exist",
    "page you requested could not be found",
    "page you are looking for",
    "page you were looking for",
    "we couldn't find that page",
    "we can't find that page",
    "we can't find the page",
    "could not be found",
    "no longer available",
    "no longer exists",
    "has been removed",
    "has been deleted",
    "content is unavailable",
    "content not available",
    "this content isn't available",
    "article not found",
    "this page isn't available",
    "this page is not available",
    "the link you followed may be broken",
    "broken link",
    "page has moved",
    "oops",
    "something went wrong",
    "an error occurred",
    "server error",
    "internal server error",
    "service unavailable",
    "access denied",
    "403 forbidden",
    "you don't have permission",
    "subscribe to continue reading",
    "subscribe to read",
    "subscription required",
    "sign in to continue reading",
    "log in to continue",
    "this content is for subscribers",
    "purchase this article",
];

/// Publisher-specific fingerprints, checked before the generic list.
const DOMAIN_FINGERPRINTS: &[(&str, &[&str])] = &[
    (
        "hbr.org",
        &[
            "this page is no longer available",
            "you have reached your limit",
            "subscribe to hbr",
            "the page you're looking for",
        ],
    ),
    (
        "sciencedirect.com",
        &[
            "article not available",
            "this article is not available",
            "get full text access",
            "purchase pdf",
        ],
    ),
    (
        "researchgate.net",
        &[
            "join researchgate to access",
            "this publication is not available",
            "request full-text",
        ],
    ),
    (
        "springer.com",
        &["access this article", "buy article pdf", "log in via an institution"],
    ),
    (
        "wsj.com",
        &["subscribe now", "continue reading your article with a wsj membership"],
    ),
    (
        "medium.com",
        &["this post is unavailable", "member-only story", "page not found on medium"],
    ),
];

static ERROR_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>[^<]*\b(404|not found|error|unavailable|missing|oops)\b[^<]*</title>")
        .expect("error title regex is valid")
});

/// Returns `true` when the markup looks like an error, soft-404 or paywall page.
///
/// # Arguments
///
/// * `html` - The fetched page body.
/// * `url` - The address the body was fetched from; selects domain fingerprints.
pub fn is_error_page(html: &str, url: &str) -> bool {
    matched_fingerprint(html, url).is_some()
}

/// The first matching phrase or title keyword, if any.
///
/// A domain fingerprint hit returns immediately; otherwise the generic phrases
/// and then the `<title>` keywords are tried.
pub fn matched_fingerprint(html: &str, url: &str) -> Option<String> {
    let lowered = html.to_lowercase();

    if let Some(host) = host_of(url) {
        for (domain, phrases) in DOMAIN_FINGERPRINTS {
            if !host.contains(domain) {
                continue;
            }
            if let Some(phrase) = phrases.iter().find(|phrase| lowered.contains(*phrase)) {
                return Some(format!("{}: {}", domain, phrase));
            }
        }
    }

    if let Some(phrase) = GENERIC_PHRASES.iter().find(|phrase| lowered.contains(*phrase)) {
        return Some((*phrase).to_string());
    }

    ERROR_TITLE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|keyword| format!("title: {}", keyword.as_str().to_lowercase()))
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
}
