use crate::cache::{CacheStore, MemoryCacheStore, ValidationCache};
use crate::config::PipelineConfig;
use crate::url_syntax;
use crate::validator::{DeepValidator, PageValidator, ValidationMetadata};
use crate::Result;
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The answer for one URL, as returned by the validation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    pub is_valid: bool,
    pub metadata: ValidationMetadata,
    pub from_cache: bool,
}

/// The `LinkChecker` struct puts the validation cache in front of a page validator.
pub struct LinkChecker<S = MemoryCacheStore> {
    validator: Arc<dyn PageValidator>,
    cache: ValidationCache<S>,
    /// The number of validations allowed in flight at once.
    concurrency: usize,
}

impl LinkChecker<MemoryCacheStore> {
    /// A deep validator behind an in-memory cache.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(DeepValidator::new(&config.validator)?),
            ValidationCache::in_memory(&config.cache),
            config.validator.concurrent_requests,
        ))
    }
}

impl<S: CacheStore> LinkChecker<S> {
    pub fn new(validator: Arc<dyn PageValidator>, cache: ValidationCache<S>, concurrency: usize) -> Self {
        Self {
            validator,
            cache,
            concurrency: concurrency.max(1),
        }
    }

    pub fn cache(&self) -> &ValidationCache<S> {
        &self.cache
    }

    /// Returns a cached verdict when one is fresh, otherwise validates and caches.
    ///
    /// Cache failures are logged and otherwise ignored.
    pub async fn check(&self, url: &str, force_fresh: bool) -> CheckOutcome {
        match self.cache.lookup(url, force_fresh).await {
            Ok(Some(entry)) => {
                debug!("Cache hit for {}", url);
                return CheckOutcome {
                    is_valid: entry.is_valid,
                    metadata: entry.metadata,
                    from_cache: true,
                };
            }
            Ok(None) => {}
            Err(e) => warn!("Cache lookup failed for {}: {}", url, e),
        }

        let verdict = self.validator.validate(url).await;

        if let Err(e) = self
            .cache
            .store(url, verdict.is_valid, verdict.metadata.clone())
            .await
        {
            warn!("Cache store failed for {}: {}", url, e);
        }

        CheckOutcome {
            is_valid: verdict.is_valid,
            metadata: verdict.metadata,
            from_cache: false,
        }
    }

    /// Syntax-only answer, used when the caller did not ask for deep validation.
    pub fn check_syntax(&self, url: &str) -> CheckOutcome {
        let is_valid = url_syntax::validate(url);
        CheckOutcome {
            is_valid,
            metadata: ValidationMetadata {
                reason: (!is_valid).then(|| "URL failed syntax validation".to_string()),
                ..Default::default()
            },
            from_cache: false,
        }
    }

    /// Checks every URL, at most `concurrency` at a time.
    ///
    /// Duplicates are checked once. Order of completion is not significant.
    pub async fn check_all(&self, urls: impl IntoIterator<Item = String>) -> HashMap<String, CheckOutcome> {
        let mut unique: Vec<String> = urls.into_iter().collect();
        unique.sort();
        unique.dedup();
        let total = unique.len();

        let results: HashMap<String, CheckOutcome> = stream::iter(unique)
            .map(|url| async move {
                let outcome = self.check(&url, false).await;
                (url, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let valid = results.values().filter(|o| o.is_valid).count();
        info!("Validated {} URLs: {} valid, {} rejected", total, valid, total - valid);

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::validator::Verdict;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingValidator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageValidator for CountingValidator {
        async fn validate(&self, url: &str) -> Verdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Verdict {
                is_valid: !url.contains("dead"),
                metadata: ValidationMetadata::default(),
            }
        }
    }

    fn checker() -> (Arc<CountingValidator>, LinkChecker) {
        let validator = Arc::new(CountingValidator {
            calls: AtomicUsize::new(0),
        });
        let checker = LinkChecker::new(
            validator.clone(),
            ValidationCache::in_memory(&CacheConfig::default()),
            2,
        );
        (validator, checker)
    }

    #[tokio::test]
    async fn test_second_check_comes_from_cache() {
        let (validator, checker) = checker();

        let first = checker.check("https://www.nature.com/a", false).await;
        let second = checker.check("https://www.nature.com/a", false).await;

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(first.is_valid, second.is_valid);
        assert_eq!(validator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_force_fresh_bypasses_cache() {
        let (validator, checker) = checker();

        checker.check("https://www.nature.com/a", false).await;
        let again = checker.check("https://www.nature.com/a", true).await;

        assert!(!again.from_cache);
        assert_eq!(validator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_check_all_dedups() {
        let (validator, checker) = checker();
        let urls = vec![
            "https://www.nature.com/a".to_string(),
            "https://www.nature.com/dead".to_string(),
            "https://www.nature.com/a".to_string(),
        ];

        let results = checker.check_all(urls).await;

        assert_eq!(results.len(), 2);
        assert!(results["https://www.nature.com/a"].is_valid);
        assert!(!results["https://www.nature.com/dead"].is_valid);
        assert_eq!(validator.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_check_syntax() {
        let (_, checker) = checker();

        assert!(checker.check_syntax("https://en.wikipedia.org/wiki/Rust").is_valid);
        let rejected = checker.check_syntax("http://localhost/x");
        assert!(!rejected.is_valid);
        assert!(rejected.metadata.reason.is_some());
    }
}
