use crate::llm::TextGenerator;
use crate::parsers;
use crate::prompt::PromptBuilder;
use crate::types::Topic;
use crate::MAX_TOPICS;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// How a topic extraction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStatus {
    /// Topics were extracted.
    Extracted,
    /// No generation credential was supplied; nothing was sent upstream.
    MissingCredential,
    /// The transcript was empty.
    EmptyTranscript,
    /// The provider failed or answered with something unusable.
    ProviderError(String),
    /// The provider answered, but with zero topics.
    NoTopics,
}

/// The result of [`TopicExtractor::extract_topics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicExtraction {
    pub topics: Vec<Topic>,
    pub status: ExtractionStatus,
}

impl TopicExtraction {
    fn empty(status: ExtractionStatus) -> Self {
        Self {
            topics: Vec::new(),
            status,
        }
    }

    /// Set when extraction could not run for lack of a credential.
    ///
    /// No substitute topics are produced in that case; the caller decides what to show.
    pub fn used_mock_data(&self) -> bool {
        self.status == ExtractionStatus::MissingCredential
    }
}

/// The `TopicExtractor` struct asks a text-generation capability for the topics of a transcript.
pub struct TopicExtractor {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl TopicExtractor {
    /// Creates a new `TopicExtractor`. `None` means no credential was supplied.
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    /// Extracts up to `desired_count` topics (clamped into `1..=10`) from `transcript`.
    ///
    /// Topics in `avoid` are passed to the provider to leave out; they are not
    /// filtered again here. Never fails: every problem ends in an empty result
    /// with a status saying why.
    #[instrument(skip(self, transcript, avoid), fields(transcript_length = transcript.len()))]
    pub async fn extract_topics(
        &self,
        transcript: &str,
        desired_count: usize,
        avoid: &[String],
    ) -> TopicExtraction {
        let Some(generator) = self.generator.as_ref() else {
            warn!("No generation credential supplied, skipping topic extraction");
            return TopicExtraction::empty(ExtractionStatus::MissingCredential);
        };

        if transcript.trim().is_empty() {
            return TopicExtraction::empty(ExtractionStatus::EmptyTranscript);
        }

        let count = clamp_count(desired_count);
        let request = PromptBuilder::new(count).avoiding(avoid).topics(transcript);

        let answer = match generator.generate(&request).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Topic extraction failed: {}", e);
                return TopicExtraction::empty(ExtractionStatus::ProviderError(e.to_string()));
            }
        };

        let Some(parsed) = parsers::parse_topic_list(&answer) else {
            error!("Topic extraction answer was not usable JSON");
            return TopicExtraction::empty(ExtractionStatus::ProviderError(
                "Unparseable topic response".to_string(),
            ));
        };

        let topics = dedup_topics(parsed, count);
        if topics.is_empty() {
            warn!("Provider returned no topics");
            return TopicExtraction::empty(ExtractionStatus::NoTopics);
        }

        info!("Extracted {} topics (requested {})", topics.len(), count);
        TopicExtraction {
            topics,
            status: ExtractionStatus::Extracted,
        }
    }
}

/// Clamps a requested topic count into `1..=MAX_TOPICS`.
pub fn clamp_count(desired_count: usize) -> usize {
    desired_count.clamp(1, MAX_TOPICS)
}

/// Keeps the first occurrence of each topic (case-insensitive), at most `limit`
/// of them, and drops topics longer than ten words.
fn dedup_topics(topics: Vec<Topic>, limit: usize) -> Vec<Topic> {
    let mut seen = HashSet::new();
    topics
        .into_iter()
        .filter(|t| {
            let words = t.topic.split_whitespace().count();
            (1..=10).contains(&words)
        })
        .filter(|t| seen.insert(t.topic.to_lowercase()))
        .take(limit)
        .collect()
}
