//! Content-aware URL validation.
//!
//! A URL moves through `Init → Fetching → {ContentCheck | Rejected} → Resolved`.
//! Every failure along the way resolves to an invalid verdict; nothing here
//! returns an error to the caller.

use crate::config::ValidatorConfig;
use crate::error_page;
use crate::page::PageInspector;
use crate::{PodlinksError, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Content types accepted without looking inside.
const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

const HTML_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

static ERROR_TITLE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(404|not found|error|unavailable|access denied|forbidden|page missing)\b")
        .expect("title keyword regex is valid")
});

/// Details gathered while validating a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Why a page that answered was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Why a page could not be checked at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The verdict of one deep validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub is_valid: bool,
    pub metadata: ValidationMetadata,
}

impl Verdict {
    fn valid(metadata: ValidationMetadata) -> Self {
        Self {
            is_valid: true,
            metadata,
        }
    }

    fn rejected(mut metadata: ValidationMetadata, reason: impl Into<String>) -> Self {
        metadata.reason = Some(reason.into());
        Self {
            is_valid: false,
            metadata,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            metadata: ValidationMetadata {
                error: Some(error.into()),
                ..Default::default()
            },
        }
    }
}

/// Something that can decide whether a URL leads to a live page.
#[async_trait]
pub trait PageValidator: Send + Sync {
    /// Resolves `url` to a verdict. Implementations must not hang past their own timeout.
    async fn validate(&self, url: &str) -> Verdict;
}

/// The `DeepValidator` struct fetches a URL and decides whether it leads to a live page.
pub struct DeepValidator {
    /// The HTTP client used for making requests.
    client: Client,
    /// Hard upper bound on one validation, body read included.
    timeout: Duration,
    reject_client_errors: bool,
    inspector: PageInspector,
}

impl DeepValidator {
    /// Creates a new `DeepValidator` with the given configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `DeepValidator`, or an error if the client could not be created.
    pub fn new(config: &ValidatorConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(5))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            timeout: config.timeout(),
            reject_client_errors: config.reject_client_errors,
            inspector: PageInspector::default(),
        })
    }

    /// Validates `url`, always resolving to a verdict.
    ///
    /// The whole fetch is bounded by the configured timeout; an unreachable
    /// host costs at most that long.
    #[instrument(skip(self))]
    pub async fn deep_validate(&self, url: &str) -> Verdict {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return Verdict::failed(format!("Invalid URL: {}", e)),
        };

        match tokio::time::timeout(self.timeout, self.fetch_and_inspect(parsed)).await {
            Ok(Ok(verdict)) => {
                debug!(valid = verdict.is_valid, "Validation resolved");
                verdict
            }
            Ok(Err(e)) => {
                warn!("Fetch failed for {}: {}", url, e);
                Verdict::failed(e.to_string())
            }
            Err(_) => {
                warn!("Validation of {} timed out", url);
                Verdict::failed(format!(
                    "Request timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            }
        }
    }

    async fn fetch_and_inspect(&self, url: Url) -> Result<Verdict> {
        let response = self
            .client
            .get(url.clone())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,application/pdf,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.5")
            .send()
            .await
            .map_err(PodlinksError::RequestError)?;

        let status = response.status();
        let metadata = ValidationMetadata {
            status: Some(status.as_u16()),
            content_type: content_type(response.headers()),
            final_url: (response.url() != &url).then(|| response.url().to_string()),
            ..Default::default()
        };

        debug!("Response status: {}", status);

        if status.is_server_error() {
            return Ok(Verdict::rejected(metadata, format!("Server error {}", status.as_u16())));
        }

        if status.is_client_error() && self.reject_client_errors {
            return Ok(Verdict::rejected(metadata, format!("Client error {}", status.as_u16())));
        }

        let kind = metadata
            .content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
            .unwrap_or_default();

        if DOCUMENT_TYPES.contains(&kind.as_str()) {
            return Ok(Verdict::valid(metadata));
        }

        if !HTML_TYPES.contains(&kind.as_str()) {
            let shown = if kind.is_empty() { "unknown" } else { kind.as_str() };
            return Ok(Verdict::rejected(
                metadata,
                format!("Unsupported content type: {}", shown),
            ));
        }

        let landed = response.url().clone();
        let html = response.text().await?;
        Ok(self.inspect_html(&html, landed.as_str(), metadata))
    }

    /// The content check of a fetched HTML page.
    ///
    /// `landed_url` is the URL after redirects; domain fingerprints are chosen by it.
    pub fn inspect_html(&self, html: &str, landed_url: &str, mut metadata: ValidationMetadata) -> Verdict {
        if let Some(fingerprint) = error_page::matched_fingerprint(html, landed_url) {
            return Verdict::rejected(metadata, format!("Error page detected ({})", fingerprint));
        }

        let summary = self.inspector.summarize(html);
        metadata.title = summary.title;
        metadata.description = summary.description;

        if let Some(title) = metadata.title.as_deref() {
            if ERROR_TITLE_KEYWORDS.is_match(title) {
                let reason = format!("Error title: {}", title);
                return Verdict::rejected(metadata, reason);
            }
        }

        Verdict::valid(metadata)
    }
}

#[async_trait]
impl PageValidator for DeepValidator {
    async fn validate(&self, url: &str) -> Verdict {
        self.deep_validate(url).await
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::io::AsyncReadExt;

    fn validator(timeout_secs: u64) -> DeepValidator {
        DeepValidator::new(&ValidatorConfig {
            timeout_secs,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_server_error_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/broken")
            .with_status(500)
            .with_header("content-type", "text/html")
            .with_body("<html><title>Welcome</title></html>")
            .create_async()
            .await;

        let verdict = validator(5).deep_validate(&format!("{}/broken", server.url())).await;

        mock.assert_async().await;
        assert!(!verdict.is_valid);
        assert_eq!(verdict.metadata.status, Some(500));
    }

    #[tokio::test]
    async fn test_welcome_page_is_valid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/article")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(
                r#"<html><head><title>Welcome</title>
                <meta name="description" content="A page about things"></head>
                <body><p>Real content.</p></body></html>"#,
            )
            .create_async()
            .await;

        let verdict = validator(5).deep_validate(&format!("{}/article", server.url())).await;

        assert!(verdict.is_valid);
        assert_eq!(verdict.metadata.title.as_deref(), Some("Welcome"));
        assert_eq!(verdict.metadata.description.as_deref(), Some("A page about things"));
    }

    #[tokio::test]
    async fn test_soft_404_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/gone")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body><h1>Sorry, page not found</h1></body></html>")
            .create_async()
            .await;

        let verdict = validator(5).deep_validate(&format!("{}/gone", server.url())).await;

        assert!(!verdict.is_valid);
        assert!(verdict.metadata.reason.unwrap().contains("page not found"));
    }

    #[tokio::test]
    async fn test_client_error_is_inspected_by_default() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/blocked")
            .with_status(403)
            .with_header("content-type", "text/html")
            .with_body("<html><head><title>Research Digest</title></head><body>Hello</body></html>")
            .create_async()
            .await;
        let url = format!("{}/blocked", server.url());

        assert!(validator(5).deep_validate(&url).await.is_valid);

        let strict = DeepValidator::new(&ValidatorConfig {
            timeout_secs: 5,
            reject_client_errors: true,
            ..Default::default()
        })
        .unwrap();
        assert!(!strict.deep_validate(&url).await.is_valid);
    }

    #[tokio::test]
    async fn test_pdf_is_valid_without_inspection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/paper.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body("%PDF-1.4 page not found")
            .create_async()
            .await;

        let verdict = validator(5).deep_validate(&format!("{}/paper.pdf", server.url())).await;

        assert!(verdict.is_valid);
    }

    #[tokio::test]
    async fn test_unsupported_content_type_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/image.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body("png")
            .create_async()
            .await;

        let verdict = validator(5).deep_validate(&format!("{}/image.png", server.url())).await;

        assert!(!verdict.is_valid);
        assert_eq!(
            verdict.metadata.reason.as_deref(),
            Some("Unsupported content type: image/png")
        );
    }

    #[tokio::test]
    async fn test_error_title_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/denied")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><head><title>Forbidden</title></head><body>Nope</body></html>")
            .create_async()
            .await;

        let verdict = validator(5).deep_validate(&format!("{}/denied", server.url())).await;

        assert!(!verdict.is_valid);
        assert_eq!(verdict.metadata.title.as_deref(), Some("Forbidden"));
    }

    #[test]
    fn test_fingerprints_follow_the_landed_domain() {
        let html = "<html><head><title>Article</title></head><body>This article is not available.</body></html>";
        let validator = validator(5);

        let redirected = validator.inspect_html(
            html,
            "https://www.sciencedirect.com/science/article/pii/S000",
            ValidationMetadata::default(),
        );
        assert!(!redirected.is_valid);
        assert!(redirected.metadata.reason.unwrap().contains("sciencedirect.com"));

        let elsewhere = validator.inspect_html(html, "https://doi.org/10.1016/x", ValidationMetadata::default());
        assert!(elsewhere.is_valid);
    }

    #[tokio::test]
    async fn test_redirect_target_is_recorded() {
        let mut server = mockito::Server::new_async().await;
        let _moved = server
            .mock("GET", "/doi/10.1/x")
            .with_status(301)
            .with_header("location", "/article/x")
            .create_async()
            .await;
        let _landed = server
            .mock("GET", "/article/x")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><head><title>Welcome</title></head><body>Full text</body></html>")
            .create_async()
            .await;

        let verdict = validator(5)
            .deep_validate(&format!("{}/doi/10.1/x", server.url()))
            .await;

        assert!(verdict.is_valid);
        assert_eq!(
            verdict.metadata.final_url,
            Some(format!("{}/article/x", server.url()))
        );
    }

    #[tokio::test]
    async fn test_unparseable_url_is_invalid() {
        let verdict = validator(5).deep_validate("not a url").await;

        assert!(!verdict.is_valid);
        assert!(verdict.metadata.error.is_some());
    }

    #[tokio::test]
    async fn test_timeout_is_invalid_and_bounded() {
        // accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                held.push(socket);
            }
        });

        let started = Instant::now();
        let verdict = validator(1).deep_validate(&format!("http://{}/slow", addr)).await;

        assert!(!verdict.is_valid);
        assert!(verdict.metadata.error.is_some());
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
