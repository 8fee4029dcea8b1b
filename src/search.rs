use crate::config::SearchConfig;
use crate::types::{ApiKey, RawLink};
use crate::{PodlinksError, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Search response as the provider sends it. Every level may be missing.
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub web: Option<WebResults>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebResults {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl SearchResponse {
    /// Converts the hits into raw links, skipping hits without a URL.
    pub fn into_links(self) -> Vec<RawLink> {
        self.web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .filter(|hit| !hit.url.trim().is_empty())
            .map(|hit| RawLink {
                url: hit.url.trim().to_string(),
                title: strip_tags(&hit.title),
                description: strip_tags(&hit.description),
            })
            .collect()
    }
}

/// A web search capability.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, result_count: usize) -> Result<SearchResponse>;
}

/// The `BraveSearch` struct queries a Brave-style web search API.
pub struct BraveSearch {
    /// The HTTP client used for making requests.
    client: Client,
    config: SearchConfig,
    api_key: ApiKey,
}

impl BraveSearch {
    /// Creates a new `BraveSearch` with the given configuration and subscription token.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `BraveSearch` instance, or an error if the client could not be created.
    pub fn new(config: SearchConfig, api_key: ApiKey) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl WebSearch for BraveSearch {
    /// Performs a search and returns the provider's response.
    ///
    /// # Arguments
    ///
    /// * `query` - The search query.
    /// * `result_count` - The number of search results to ask for.
    #[instrument(skip(self))]
    async fn search(&self, query: &str, result_count: usize) -> Result<SearchResponse> {
        let url = format!(
            "{}?q={}&count={}",
            self.config.endpoint,
            urlencoding::encode(query),
            result_count
        );

        debug!("Search URL: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", self.api_key.expose())
            .send()
            .await?;

        let status = response.status();
        debug!("Response status: {}", status);

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PodlinksError::ProviderError {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| PodlinksError::ParseError(format!("Search response: {}", e)))
    }
}

/// Search snippets carry `<strong>` highlighting and entities; keep the text only.
fn strip_tags(text: &str) -> String {
    let fragment = Html::parse_fragment(text);
    let joined: String = fragment.root_element().text().collect();
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}
