//! Caller-supplied exclusions for domains and topics.

use crate::url_syntax::host_matches;
use crate::MAX_EXCLUSIONS;
use std::collections::BTreeSet;
use url::Url;

/// Domains and topics that must not appear among results.
///
/// Both lists are lowercase and hold at most [`MAX_EXCLUSIONS`] entries; extra
/// entries are ignored in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionPolicy {
    domains: BTreeSet<String>,
    topics: BTreeSet<String>,
}

impl ExclusionPolicy {
    pub fn new<D, T>(domains: D, topics: T) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        Self {
            domains: bounded(domains.into_iter().filter_map(|d| normalize_domain(d.as_ref()))),
            topics: bounded(
                topics
                    .into_iter()
                    .map(|t| t.as_ref().trim().to_lowercase())
                    .filter(|t| !t.is_empty()),
            ),
        }
    }

    pub fn domains(&self) -> Vec<String> {
        self.domains.iter().cloned().collect()
    }

    pub fn topics(&self) -> Vec<String> {
        self.topics.iter().cloned().collect()
    }

    /// Returns `true` when the URL's host equals or is a subdomain of an excluded domain.
    ///
    /// URLs that do not parse are not this policy's concern and are not excluded here.
    pub fn is_url_excluded(&self, url: &str) -> bool {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        else {
            return false;
        };

        self.domains.iter().any(|domain| host_matches(&host, domain))
    }

    /// Returns `true` when `topic` matches an excluded topic, ignoring case.
    pub fn is_topic_excluded(&self, topic: &str) -> bool {
        self.topics.contains(&topic.trim().to_lowercase())
    }
}

fn bounded(items: impl Iterator<Item = String>) -> BTreeSet<String> {
    let mut set = BTreeSet::new();
    for item in items {
        if set.len() >= MAX_EXCLUSIONS {
            break;
        }
        set.insert(item);
    }
    set
}

/// Reduces user input such as `https://www.news.bbc.co.uk/path` to a bare domain.
///
/// Keeps only the last two labels, so `a.b.co.uk` becomes `co.uk`. Multi-part
/// public suffixes are not understood.
pub fn normalize_domain(input: &str) -> Option<String> {
    let lowered = input.trim().to_lowercase();
    let without_scheme = lowered
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(&lowered);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    // drop credentials and port
    let host = host.rsplit('@').next().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);
    let host = host.strip_prefix("www.").unwrap_or(host).trim_matches('.');

    if host.is_empty() {
        return None;
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let start = labels.len().saturating_sub(2);
    Some(labels[start..].join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("https://www.Excluded.com/path?q=1").as_deref(), Some("excluded.com"));
        assert_eq!(normalize_domain("sub.excluded.com").as_deref(), Some("excluded.com"));
        assert_eq!(normalize_domain("excluded.com:8080").as_deref(), Some("excluded.com"));
        assert_eq!(normalize_domain("  ").as_deref(), None);
    }

    #[test]
    fn test_two_label_reduction_of_multi_part_suffix() {
        assert_eq!(normalize_domain("news.bbc.co.uk").as_deref(), Some("co.uk"));
    }

    #[test]
    fn test_subdomain_is_excluded() {
        let policy = ExclusionPolicy::new(["excluded.com"], Vec::<String>::new());

        assert!(policy.is_url_excluded("https://sub.excluded.com/page"));
        assert!(policy.is_url_excluded("https://excluded.com/page"));
        assert!(!policy.is_url_excluded("https://notexcluded.com/page"));
        assert!(!policy.is_url_excluded("not a url"));
    }

    #[test]
    fn test_lists_are_capped() {
        let domains: Vec<String> = (0..15).map(|i| format!("site{}.com", i)).collect();
        let policy = ExclusionPolicy::new(&domains, ["Crypto", "  "]);

        assert_eq!(policy.domains().len(), MAX_EXCLUSIONS);
        assert_eq!(policy.topics(), vec!["crypto".to_string()]);
    }

    #[test]
    fn test_topic_exclusion_ignores_case() {
        let policy = ExclusionPolicy::new(Vec::<String>::new(), ["AI Ethics"]);

        assert!(policy.is_topic_excluded("ai ethics"));
        assert!(!policy.is_topic_excluded("AI Safety"));
    }
}
