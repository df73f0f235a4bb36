use super::{validate_vector, EmbeddingProvider};
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Remote embedding provider speaking the OpenAI-style `/embeddings` protocol
///
/// Truncates oversize inputs, retries with exponential backoff, and rejects
/// vectors that fail dimension or finiteness validation. A rejected vector
/// counts as a provider failure for retry purposes.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbeddingProvider {
    pub fn new(config: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Whether an endpoint is configured at all
    pub fn is_configured(&self) -> bool {
        !self.config.endpoint.is_empty()
    }

    fn truncate_input<'a>(&self, text: &'a str) -> std::borrow::Cow<'a, str> {
        let char_count = text.chars().count();
        if char_count <= self.config.max_input_chars {
            return std::borrow::Cow::Borrowed(text);
        }

        tracing::warn!(
            "Truncated embedding input from {} to {} characters",
            char_count,
            self.config.max_input_chars
        );
        std::borrow::Cow::Owned(text.chars().take(self.config.max_input_chars).collect())
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let body = serde_json::json!({
            "input": text,
            "model": self.config.model,
        });

        let mut request = self.client.post(&self.config.endpoint).json(&body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::RequestFailed(format!(
                "provider returned {}: {}",
                status, detail
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(EmbeddingError::EmptyResponse)?;

        validate_vector(&vector, self.config.dimension)?;
        Ok(vector)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if !self.is_configured() {
            return Err(EmbeddingError::NotConfigured);
        }

        let text = self.truncate_input(text);

        let mut last_error = String::new();
        for attempt in 0..self.config.max_retries {
            match self.request_embedding(&text).await {
                Ok(vector) => return Ok(vector),
                Err(EmbeddingError::NotConfigured) => return Err(EmbeddingError::NotConfigured),
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!(
                        "Embedding attempt {}/{} failed: {}",
                        attempt + 1,
                        self.config.max_retries,
                        last_error
                    );

                    if attempt + 1 < self.config.max_retries {
                        let delay = self.config.base_delay_ms * (1 << attempt);
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }

        Err(EmbeddingError::Unavailable {
            attempts: self.config.max_retries,
            reason: last_error,
        })
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            endpoint: endpoint.to_string(),
            dimension: 4,
            max_input_chars: 16,
            max_retries: 2,
            base_delay_ms: 1,
            ..EmbeddingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_unconfigured_provider_fails_fast() {
        let provider = HttpEmbeddingProvider::new(config("")).unwrap();
        assert!(!provider.is_configured());

        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::NotConfigured));
    }

    #[test]
    fn test_truncation_bounds_input() {
        let provider = HttpEmbeddingProvider::new(config("http://unused")).unwrap();
        let long = "x".repeat(100);
        let truncated = provider.truncate_input(&long);
        assert_eq!(truncated.chars().count(), 16);

        let short = "short";
        assert_eq!(provider.truncate_input(short), "short");
    }

    #[test]
    fn test_dimension_and_model_name() {
        let provider = HttpEmbeddingProvider::new(config("http://unused")).unwrap();
        assert_eq!(provider.dimension(), 4);
        assert_eq!(provider.model_name(), "text-embedding-ada-002");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_exhausts_retries() {
        // Port 1 on loopback refuses the connection immediately
        let mut cfg = config("http://127.0.0.1:1/v1/embeddings");
        cfg.max_retries = 2;
        let provider = HttpEmbeddingProvider::new(cfg).unwrap();

        let err = provider.embed("hello").await.unwrap_err();
        match err {
            EmbeddingError::Unavailable { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }
}
