//! OpenAI-compatible API client for embeddings and chat completions.

use serde::{Deserialize, Serialize};

use super::AiError;
use crate::config::AiConfig;
use crate::utils::HttpClient;

/// Longest input accepted for embedding requests, in characters
const EMBED_INPUT_BUDGET: usize = 8000;

/// Client for an OpenAI-compatible API
///
/// Works against api.openai.com or any compatible endpoint (the base URL is
/// configurable). Without an API key the client reports itself as disabled
/// and callers fall back to non-AI behavior.
#[derive(Debug, Clone)]
pub struct AiClient {
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    embedding_model: String,
    enabled: bool,
}

impl AiClient {
    /// Create a client from configuration
    pub fn new(config: &AiConfig, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: HttpClient::new()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            enabled: config.enabled && api_key.is_some(),
            api_key,
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    /// Override the base URL (used by tests against a local server)
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Whether AI calls will actually be made
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header(reqwest::header::AUTHORIZATION, format!("Bearer {}", key)),
            None => builder,
        }
    }

    /// Get an embedding vector for the given text.
    ///
    /// Empty or whitespace-only input returns `None` without an API call.
    /// Input longer than the embedding budget is truncated.
    pub async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, AiError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        if !self.enabled {
            return Err(AiError::Disabled);
        }

        let input: String = text.chars().take(EMBED_INPUT_BUDGET).collect();

        let request = EmbeddingsRequest {
            model: self.embedding_model.clone(),
            input,
        };

        let response = self
            .authorize(self.client.post(&self.endpoint("/embeddings")))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::Api(format!("embeddings HTTP {}", status)));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| AiError::Parse(e.to_string()))?;

        Ok(parsed.data.into_iter().next().map(|d| d.embedding))
    }

    /// Run a chat completion and return the assistant message content
    pub async fn chat(
        &self,
        system: &str,
        user: &str,
        max_tokens: Option<u64>,
        temperature: Option<f64>,
    ) -> Result<String, AiError> {
        if !self.enabled {
            return Err(AiError::Disabled);
        }

        let request = ChatCompletionsRequest {
            model: self.chat_model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens,
            temperature,
            stream: Some(false),
        };

        let response = self
            .authorize(self.client.post(&self.endpoint("/chat/completions")))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::Api(format!("chat.completions HTTP {}", status)));
        }

        let parsed: ChatCompletionsResponse = response
            .json()
            .await
            .map_err(|e| AiError::Parse(e.to_string()))?;

        Ok(parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest {
    model: String,
    input: String,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiConfig;

    fn disabled_client() -> AiClient {
        AiClient::new(&AiConfig::default(), None).unwrap()
    }

    fn enabled_client(base_url: &str) -> AiClient {
        AiClient::new(&AiConfig::default(), Some("test-key".to_string()))
            .unwrap()
            .with_base_url(base_url)
    }

    #[tokio::test]
    async fn test_embed_empty_input_skips_api() {
        // Even a disabled client answers for empty input
        let client = disabled_client();
        let result = client.embed("   ").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_embed_disabled() {
        let client = disabled_client();
        assert!(!client.is_enabled());
        assert!(matches!(client.embed("text").await, Err(AiError::Disabled)));
    }

    #[tokio::test]
    async fn test_chat_disabled() {
        let client = disabled_client();
        assert!(matches!(
            client.chat("sys", "user", None, None).await,
            Err(AiError::Disabled)
        ));
    }

    #[tokio::test]
    async fn test_embed_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(r#"{"data": [{"embedding": [0.1, 0.2, 0.3]}]}"#)
            .create_async()
            .await;

        let client = enabled_client(&server.url());
        let embedding = client.embed("some abstract").await.unwrap().unwrap();

        assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "A summary."}}]}"#)
            .create_async()
            .await;

        let client = enabled_client(&server.url());
        let content = client.chat("sys", "user", Some(200), Some(0.3)).await.unwrap();

        assert_eq!(content, "A summary.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .create_async()
            .await;

        let client = enabled_client(&server.url());
        assert!(matches!(
            client.chat("sys", "user", None, None).await,
            Err(AiError::Api(_))
        ));
    }
}
