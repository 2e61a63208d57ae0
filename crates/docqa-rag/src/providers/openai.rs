//! OpenAI-compatible HTTP client with retry logic
//!
//! Implements both provider traits against the `/embeddings` and
//! `/chat/completions` endpoints of an OpenAI-style API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::ProviderConfig;
use crate::error::{Error, Result};

use super::chat::{ChatMessage, ChatProvider, Completion};
use super::embedding::EmbeddingProvider;

/// HTTP client for an OpenAI-compatible API
pub struct OpenAiClient {
    client: Client,
    config: ProviderConfig,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u32,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            "provider request failed (attempt {}/{}), retrying in {:?}",
                            attempt + 1,
                            self.config.max_retries + 1,
                            delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::EmbeddingProvider("request failed with no error".to_string())))
    }

    /// Issue one embeddings call for at most `embed_batch_max` strings
    async fn embed_batch_call(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.config.base_url);
        let model = self.config.embedding_model.clone();
        let api_key = self.config.api_key.clone();
        let client = self.client.clone();
        let texts = texts.to_vec();

        self.retry_request(|| {
            let url = url.clone();
            let model = model.clone();
            let api_key = api_key.clone();
            let client = client.clone();
            let texts = texts.clone();

            async move {
                let request = EmbeddingsRequest {
                    model: &model,
                    input: &texts,
                };

                let response = client
                    .post(&url)
                    .bearer_auth(&api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::EmbeddingProvider(format!("request failed: {}", e)))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::EmbeddingProvider(format!(
                        "HTTP {} - {}",
                        status, body
                    )));
                }

                let parsed: EmbeddingsResponse = response.json().await.map_err(|e| {
                    Error::EmbeddingProvider(format!("failed to parse response: {}", e))
                })?;

                if parsed.data.len() != texts.len() {
                    return Err(Error::EmbeddingProvider(format!(
                        "expected {} embeddings, got {}",
                        texts.len(),
                        parsed.data.len()
                    )));
                }

                // Provider order is not guaranteed; restore input order by index
                let mut data = parsed.data;
                data.sort_by_key(|item| item.index);
                Ok(data.into_iter().map(|item| item.embedding).collect())
            }
        })
        .await
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let input = vec![text.to_string()];
        let mut embeddings = self.embed_batch_call(&input).await?;
        embeddings
            .pop()
            .ok_or_else(|| Error::EmbeddingProvider("empty embedding response".to_string()))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.embed_batch_max.max(1)) {
            embeddings.extend(self.embed_batch_call(batch).await?);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.config.embedding_dimension
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.config.base_url);
        match self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Completion> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let model = self.config.chat_model.clone();
        let api_key = self.config.api_key.clone();
        let client = self.client.clone();
        let messages = messages.to_vec();

        self.retry_request(|| {
            let url = url.clone();
            let model = model.clone();
            let api_key = api_key.clone();
            let client = client.clone();
            let messages = messages.clone();

            async move {
                let request = ChatCompletionRequest {
                    model: &model,
                    messages: &messages,
                    temperature,
                    max_tokens,
                };

                let response = client
                    .post(&url)
                    .bearer_auth(&api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::ChatProvider(format!("request failed: {}", e)))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::ChatProvider(format!("HTTP {} - {}", status, body)));
                }

                let parsed: ChatCompletionResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::ChatProvider(format!("failed to parse response: {}", e)))?;

                let text = parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .ok_or_else(|| Error::ChatProvider("completion had no content".to_string()))?;

                Ok(Completion {
                    text,
                    tokens_used: parsed.usage.map(|u| u.total_tokens).unwrap_or(0),
                    model: parsed.model,
                })
            }
        })
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        EmbeddingProvider::health_check(self).await
    }

    fn model(&self) -> &str {
        &self.config.chat_model
    }
}
