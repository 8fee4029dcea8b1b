use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// The `PipelineConfig` struct holds the configuration settings for the link pipeline.
/// It includes settings for URL validation, the validation cache, the generation and
/// search providers, link finding, and the validation service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Settings for the deep URL validator.
    pub validator: ValidatorConfig,
    /// Settings for the validation cache.
    pub cache: CacheConfig,
    /// Settings for the text-generation provider.
    pub generation: GenerationConfig,
    /// Settings for the web search provider.
    pub search: SearchConfig,
    /// Settings for the link finder.
    pub finder: FinderConfig,
    /// Settings for the validation service.
    pub server: ServerConfig,
}

/// The `ValidatorConfig` struct holds the settings for deep URL validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Hard timeout for one fetch, in seconds.
    pub timeout_secs: u64,
    /// The user agent string sent with validation requests.
    pub user_agent: String,
    /// The number of validations allowed in flight at once.
    pub concurrent_requests: usize,
    /// Treat 4xx statuses as invalid without inspecting the body.
    ///
    /// Off by default: many sites answer bots with 403 for pages that are fine.
    pub reject_client_errors: bool,
}

/// The `CacheConfig` struct holds the two staleness horizons of the validation cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a verdict is trusted without re-checking, in seconds.
    pub freshness_secs: u64,
    /// How long a row may be kept at all, in seconds.
    pub retention_secs: u64,
}

/// The `GenerationConfig` struct holds the settings for the text-generation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// The chat-completions endpoint URL.
    pub endpoint: String,
    /// The model name sent with each request.
    pub model: String,
    /// The temperature setting, controlling the randomness of the output.
    pub temperature: f32,
    /// The maximum number of tokens allowed in the response.
    pub max_tokens: u32,
    /// Request timeout, in seconds.
    pub timeout_secs: u64,
}

/// The `SearchConfig` struct holds the settings for the web search provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// The web search endpoint URL.
    pub endpoint: String,
    /// Number of results requested per topic.
    pub result_count: usize,
    /// Request timeout, in seconds.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderConfig {
    /// The number of per-topic provider calls allowed in flight at once.
    pub concurrent_requests: usize,
    /// Links asked for per topic from the generation provider.
    pub links_per_topic: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the validation service binds to.
    pub bind: String,
}

impl ValidatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CacheConfig {
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: crate::DEFAULT_VALIDATION_TIMEOUT.as_secs(),
            user_agent: String::from(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            ),
            concurrent_requests: crate::DEFAULT_CONCURRENT_VALIDATIONS,
            reject_client_errors: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_secs: crate::DEFAULT_CACHE_FRESHNESS.as_secs(),
            retention_secs: crate::DEFAULT_CACHE_RETENTION.as_secs(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from("https://api.openai.com/v1/chat/completions"),
            model: String::from("gpt-4o-mini"),
            temperature: 0.1,
            max_tokens: 2048,
            timeout_secs: 60,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from("https://api.search.brave.com/res/v1/web/search"),
            result_count: 3,
            timeout_secs: 20,
        }
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            concurrent_requests: crate::DEFAULT_CONCURRENT_PROVIDER_CALLS,
            links_per_topic: 3,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: String::from("127.0.0.1:8787"),
        }
    }
}

impl PipelineConfig {
    /// Loads the configuration by layering the defaults, an optional file and the
    /// environment.
    ///
    /// Environment variables use the `PODLINKS` prefix and `__` as the section
    /// separator, e.g. `PODLINKS__VALIDATOR__TIMEOUT_SECS=5`.
    ///
    /// # Arguments
    ///
    /// * `path` - An optional TOML, YAML or JSON file. A missing file is an error only when a path is given.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("PODLINKS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
