use crate::config::{FinderConfig, SearchConfig};
use crate::llm::TextGenerator;
use crate::parsers;
use crate::policy::ExclusionPolicy;
use crate::prompt::PromptBuilder;
use crate::search::WebSearch;
use crate::types::{ProcessedTopic, Provider, Topic};
use crate::url_syntax;
use crate::{PodlinksError, Result};
use futures::{stream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The result of one link finding run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSearch {
    pub processed_topics: Vec<ProcessedTopic>,
}

/// The capabilities available to the finder. A missing one had no credential.
#[derive(Clone, Default)]
pub struct Providers {
    pub generation: Option<Arc<dyn TextGenerator>>,
    pub search: Option<Arc<dyn WebSearch>>,
}

/// The `LinkFinder` struct discovers links for topics through one provider at a time.
pub struct LinkFinder {
    providers: Providers,
    config: FinderConfig,
    result_count: usize,
}

impl LinkFinder {
    pub fn new(providers: Providers, config: FinderConfig, search: &SearchConfig) -> Self {
        Self {
            providers,
            config,
            result_count: search.result_count,
        }
    }

    pub fn has_credential(&self, provider: Provider) -> bool {
        match provider {
            Provider::Primary => self.providers.generation.is_some(),
            Provider::Secondary => self.providers.search.is_some(),
        }
    }

    /// Finds links for every topic through `provider`.
    ///
    /// Refuses to call a provider without a credential. Topics whose links are all
    /// filtered out are left out of the result. Provider failures are logged and
    /// only cost the topic they happened on.
    #[instrument(skip(self, topics, policy), fields(topics = topics.len()))]
    pub async fn find_links(
        &self,
        topics: &[Topic],
        provider: Provider,
        policy: &ExclusionPolicy,
    ) -> LinkSearch {
        if !self.has_credential(provider) {
            warn!("No credential for the {}, skipping link search", provider.name());
            return LinkSearch::default();
        }

        let wanted: Vec<&Topic> = topics
            .iter()
            .filter(|t| !t.topic.trim().is_empty())
            .filter(|t| {
                let excluded = policy.is_topic_excluded(&t.topic);
                if excluded {
                    debug!("Skipping excluded topic '{}'", t.topic);
                }
                !excluded
            })
            .collect();

        let excluded_domains = policy.domains();
        let found: Vec<Vec<ProcessedTopic>> = stream::iter(wanted)
            .map(|topic| {
                let excluded_domains = &excluded_domains;
                async move {
                    match self.query(topic, provider, excluded_domains).await {
                        Ok(found) => found,
                        Err(e) => {
                            warn!("Link search for '{}' failed: {}", topic.topic, e);
                            Vec::new()
                        }
                    }
                }
            })
            .buffer_unordered(self.config.concurrent_requests.max(1))
            .collect()
            .await;

        let processed_topics: Vec<ProcessedTopic> = found
            .into_iter()
            .flatten()
            .filter_map(|topic| filter_links(topic, policy))
            .collect();

        info!(
            "Found links for {} of {} topics via the {}",
            processed_topics.len(),
            topics.len(),
            provider.name()
        );

        LinkSearch { processed_topics }
    }

    async fn query(
        &self,
        topic: &Topic,
        provider: Provider,
        excluded_domains: &[String],
    ) -> Result<Vec<ProcessedTopic>> {
        match provider {
            Provider::Primary => {
                let generator = self
                    .providers
                    .generation
                    .as_ref()
                    .ok_or(PodlinksError::MissingCredential("generation provider"))?;
                let request = PromptBuilder::new(self.config.links_per_topic)
                    .excluding_domains(excluded_domains)
                    .links(topic);
                let answer = generator.generate(&request).await?;
                Ok(parsers::parse_link_response(&answer, std::slice::from_ref(topic)))
            }
            Provider::Secondary => {
                let search = self
                    .providers
                    .search
                    .as_ref()
                    .ok_or(PodlinksError::MissingCredential("search provider"))?;
                let links = search.search(&topic.topic, self.result_count).await?.into_links();
                Ok(vec![ProcessedTopic {
                    topic: topic.topic.clone(),
                    context: (!topic.context.is_empty()).then(|| topic.context.clone()),
                    links,
                }])
            }
        }
    }
}

/// Keeps links with a plausible, non-excluded URL, once each. `None` if none survive.
pub fn filter_links(mut topic: ProcessedTopic, policy: &ExclusionPolicy) -> Option<ProcessedTopic> {
    let mut seen = HashSet::new();
    topic.links.retain(|link| {
        url_syntax::validate(&link.url)
            && !policy.is_url_excluded(&link.url)
            && seen.insert(link.url.clone())
    });

    if topic.links.is_empty() {
        debug!("Dropping topic '{}' with no usable links", topic.topic);
        None
    } else {
        Some(topic)
    }
}
