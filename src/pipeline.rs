use crate::assemble::{assemble, group_processed_topics};
use crate::cache::{CacheStore, MemoryCacheStore};
use crate::checker::LinkChecker;
use crate::config::PipelineConfig;
use crate::finder::{LinkFinder, Providers};
use crate::llm::{ChatGenerator, TextGenerator};
use crate::policy::ExclusionPolicy;
use crate::search::{BraveSearch, WebSearch};
use crate::topics::{ExtractionStatus, TopicExtractor};
use crate::types::{ApiKey, LinkItem, ProcessedTopic, Provider, Topic};
use crate::Result;
use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Credentials supplied by the caller. A missing key disables its provider.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub generation: Option<ApiKey>,
    pub search: Option<ApiKey>,
}

/// One transcript run.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub transcript: String,
    pub desired_count: usize,
    /// Providers to query, each for every topic.
    pub providers: Vec<Provider>,
    pub policy: ExclusionPolicy,
}

/// Where a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    /// Link items are ready.
    Ready,
    /// No generation credential; the run stopped before link finding.
    MissingCredential,
    /// Topic extraction produced nothing.
    NoTopics(ExtractionStatus),
    /// Topics were found but none kept a valid link.
    NoLinks,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub topics: Vec<Topic>,
    pub items: Vec<LinkItem>,
    pub status: PipelineStatus,
}

impl PipelineOutcome {
    fn halted(status: PipelineStatus) -> Self {
        Self {
            topics: Vec::new(),
            items: Vec::new(),
            status,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Set when the run stopped for lack of a generation credential.
    pub fn used_mock_data(&self) -> bool {
        self.status == PipelineStatus::MissingCredential
    }
}

/// The `Pipeline` struct runs transcript → topics → links → validation → link items.
pub struct Pipeline<S = MemoryCacheStore> {
    extractor: TopicExtractor,
    finder: LinkFinder,
    checker: Arc<LinkChecker<S>>,
    /// The progress display for the stages of a run.
    progress: MultiProgress,
}

impl Pipeline<MemoryCacheStore> {
    /// Builds the pipeline with the HTTP providers and an in-memory cache.
    pub fn from_config(config: &PipelineConfig, credentials: Credentials) -> Result<Self> {
        let generation = credentials
            .generation
            .map(|key| ChatGenerator::new(config.generation.clone(), key))
            .transpose()?
            .map(|g| Arc::new(g) as Arc<dyn TextGenerator>);
        let search = credentials
            .search
            .map(|key| BraveSearch::new(config.search.clone(), key))
            .transpose()?
            .map(|s| Arc::new(s) as Arc<dyn WebSearch>);

        Ok(Self::new(
            config,
            Providers { generation, search },
            Arc::new(LinkChecker::from_config(config)?),
        ))
    }
}

impl<S: CacheStore> Pipeline<S> {
    pub fn new(config: &PipelineConfig, providers: Providers, checker: Arc<LinkChecker<S>>) -> Self {
        Self {
            extractor: TopicExtractor::new(providers.generation.clone()),
            finder: LinkFinder::new(providers, config.finder.clone(), &config.search),
            checker,
            progress: MultiProgress::new(),
        }
    }

    pub fn checker(&self) -> Arc<LinkChecker<S>> {
        self.checker.clone()
    }

    /// Runs a whole transcript through the pipeline.
    ///
    /// Never fails; an empty result carries a status saying why it is empty.
    #[instrument(skip(self, request), fields(transcript_length = request.transcript.len()))]
    pub async fn run(&self, request: &PipelineRequest) -> PipelineOutcome {
        let spinner = self.spinner("Extracting topics...");
        let extraction = self
            .extractor
            .extract_topics(&request.transcript, request.desired_count, &request.policy.topics())
            .await;

        match extraction.status {
            ExtractionStatus::Extracted => {}
            ExtractionStatus::MissingCredential => {
                spinner.finish_with_message("No generation credential supplied");
                return PipelineOutcome::halted(PipelineStatus::MissingCredential);
            }
            other => {
                spinner.finish_with_message("No topics found");
                return PipelineOutcome::halted(PipelineStatus::NoTopics(other));
            }
        }

        let topics = extraction.topics;
        spinner.set_message(format!("Finding links for {} topics...", topics.len()));
        let found = self.find_links(&topics, request).await;

        spinner.set_message(format!("Validating links for {} topics...", found.len()));
        let validated = self.validate(found).await;

        let items = assemble(&validated, &topics);
        spinner.finish_with_message(format!(
            "Completed: {} links across {} topics",
            items.len(),
            validated.len()
        ));

        let status = if items.is_empty() {
            warn!("No valid links found for any topic");
            PipelineStatus::NoLinks
        } else {
            PipelineStatus::Ready
        };

        PipelineOutcome {
            topics,
            items,
            status,
        }
    }

    /// Queries every requested provider for `topics` and merges the results.
    pub async fn find_links(&self, topics: &[Topic], request: &PipelineRequest) -> Vec<ProcessedTopic> {
        let searches = request
            .providers
            .iter()
            .map(|provider| self.finder.find_links(topics, *provider, &request.policy));

        let batches = join_all(searches)
            .await
            .into_iter()
            .flat_map(|search| search.processed_topics);

        group_processed_topics(batches)
    }

    /// Deep-validates every link and keeps only the live ones.
    pub async fn validate(&self, topics: Vec<ProcessedTopic>) -> Vec<ProcessedTopic> {
        let urls = topics
            .iter()
            .flat_map(|t| t.links.iter().map(|l| l.url.clone()));
        let verdicts = self.checker.check_all(urls).await;

        let kept: Vec<ProcessedTopic> = topics
            .into_iter()
            .filter_map(|mut topic| {
                topic
                    .links
                    .retain(|link| verdicts.get(&link.url).is_some_and(|v| v.is_valid));
                (!topic.links.is_empty()).then_some(topic)
            })
            .collect();

        info!("{} topics kept at least one valid link", kept.len());
        kept
    }

    fn spinner(&self, message: &str) -> ProgressBar {
        let spinner = self.progress.add(ProgressBar::new_spinner());
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner.set_message(message.to_string());
        spinner
    }
}
