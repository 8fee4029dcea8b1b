use std::time::Duration;
use thiserror::Error;

pub mod assemble;
pub mod cache;
pub mod checker;
pub mod config;
pub mod error_page;
pub mod export;
pub mod finder;
pub mod llm;
pub mod page;
pub mod parsers;
pub mod pipeline;
pub mod policy;
pub mod prompt;
pub mod search;
pub mod server;
pub mod text_extract;
pub mod topics;
pub mod types;
pub mod url_syntax;
pub mod validator;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use types::{ApiKey, LinkItem, ProcessedTopic, Provider, RawLink, Topic};

/// The `PodlinksError` enum represents the errors that can occur inside the link pipeline.
///
/// Most public operations never surface these to their caller: the validator turns them
/// into an invalid verdict and the extractors turn them into empty results.
#[derive(Error, Debug)]
pub enum PodlinksError {
    /// Represents an error that occurs during an HTTP request.
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Represents a non-success answer from a generation or search provider.
    #[error("Provider returned {status}: {message}")]
    ProviderError { status: u16, message: String },
    /// Represents a provider response that could not be understood.
    #[error("Response parsing failed: {0}")]
    ParseError(String),
    /// Represents a call that was refused because no usable credential was supplied.
    #[error("Missing credential for {0}")]
    MissingCredential(&'static str),
    /// Represents an invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ::config::ConfigError),
    /// Represents a URL that could not be parsed.
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
    /// Represents a filesystem error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A type alias for `Result` with the `PodlinksError` error type.
pub type Result<T> = std::result::Result<T, PodlinksError>;

// Constants

/// The hard timeout for a single deep validation fetch.
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);
/// The default number of deep validations allowed in flight at once.
pub const DEFAULT_CONCURRENT_VALIDATIONS: usize = 8;
/// The default number of provider calls allowed in flight at once.
pub const DEFAULT_CONCURRENT_PROVIDER_CALLS: usize = 4;
/// How long a cached verdict is trusted without re-checking.
pub const DEFAULT_CACHE_FRESHNESS: Duration = Duration::from_secs(24 * 60 * 60);
/// How long a cached row may be kept at all.
pub const DEFAULT_CACHE_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);
/// Upper bound on topics requested from the generation capability.
pub const MAX_TOPICS: usize = 10;
/// Upper bound on entries in an exclusion list.
pub const MAX_EXCLUSIONS: usize = 10;
