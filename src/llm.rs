use crate::config::GenerationConfig;
use crate::types::ApiKey;
use crate::{PodlinksError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// One call to a text-generation capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// What the model is asked to do.
    pub instructions: String,
    /// The material it works on.
    pub content: String,
    /// Ask the provider for a JSON answer.
    pub structured_output: bool,
}

/// A text-generation capability. Returns the raw text of the answer.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// The `ChatGenerator` struct talks to an OpenAI-compatible chat-completions endpoint.
pub struct ChatGenerator {
    /// The HTTP client used for making requests.
    client: Client,
    config: GenerationConfig,
    api_key: ApiKey,
}

impl ChatGenerator {
    /// Creates a new `ChatGenerator`.
    ///
    /// # Arguments
    ///
    /// * `config` - Endpoint, model and sampling settings.
    /// * `api_key` - The bearer credential for the endpoint.
    pub fn new(config: GenerationConfig, api_key: ApiKey) -> Result<Self> {
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
impl TextGenerator for ChatGenerator {
    #[instrument(skip(self, request), fields(content_length = request.content.len()))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.instructions,
                },
                ChatMessage {
                    role: "user",
                    content: &request.content,
                },
            ],
            response_format: request.structured_output.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        debug!("Generation response status: {}", status);

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PodlinksError::ProviderError {
                status: status.as_u16(),
                message: truncate(&message, 200),
            });
        }

        let reply: ChatResponse = response.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| PodlinksError::ParseError("Generation response had no content".to_string()))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn generator(endpoint: String) -> ChatGenerator {
        let config = GenerationConfig {
            endpoint,
            ..Default::default()
        };
        ChatGenerator::new(config, ApiKey::new("test-key").unwrap()).unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            instructions: "List topics".to_string(),
            content: "A transcript".to_string(),
            structured_output: true,
        }
    }

    #[tokio::test]
    async fn test_generate_returns_message_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(json!({
                "response_format": {"type": "json_object"},
                "messages": [
                    {"role": "system", "content": "List topics"},
                    {"role": "user", "content": "A transcript"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"choices": [{"message": {"content": "{\"topics\": []}"}}]}).to_string(),
            )
            .create_async()
            .await;

        let text = generator(format!("{}/v1/chat/completions", server.url()))
            .generate(&request())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(text, "{\"topics\": []}");
    }

    #[tokio::test]
    async fn test_non_success_is_provider_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body("invalid key")
            .create_async()
            .await;

        let err = generator(format!("{}/v1/chat/completions", server.url()))
            .generate(&request())
            .await
            .unwrap_err();

        assert!(matches!(err, PodlinksError::ProviderError { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_empty_choices_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let err = generator(format!("{}/v1/chat/completions", server.url()))
            .generate(&request())
            .await
            .unwrap_err();

        assert!(matches!(err, PodlinksError::ParseError(_)));
    }
}
