use crate::config::GenerationConfig;
use crate::error::GenerationError;
use serde::Deserialize;
use std::time::Duration;

/// Trait for language-model completion providers
#[async_trait::async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Produce a completion for a system prompt and user message
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, GenerationError>;

    /// Provider/model name for logs and fallback reporting
    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Remote provider speaking the OpenAI-style chat-completions protocol
///
/// One instance per model; the orchestrator builds a chain of these from
/// the configured primary and fallback models.
pub struct HttpGenerationProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl HttpGenerationProvider {
    pub fn new(config: &GenerationConfig, model: &str) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.response_timeout_secs))
            .build()
            .map_err(|e| GenerationError::ProviderFailed {
                provider: model.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: model.to_string(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Build the provider chain for a configuration: primary model first,
    /// then each fallback in order. Empty when no endpoint is configured.
    pub fn chain(config: &GenerationConfig) -> Vec<std::sync::Arc<dyn GenerationProvider>> {
        if config.endpoint.is_empty() {
            return Vec::new();
        }

        std::iter::once(&config.model)
            .chain(config.fallback_models.iter())
            .filter_map(|model| match Self::new(config, model) {
                Ok(provider) => {
                    Some(std::sync::Arc::new(provider) as std::sync::Arc<dyn GenerationProvider>)
                }
                Err(e) => {
                    tracing::warn!("Skipping generation provider '{}': {}", model, e);
                    None
                }
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl GenerationProvider for HttpGenerationProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_message},
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GenerationError::ProviderFailed {
                provider: self.model.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerationError::ProviderFailed {
                provider: self.model.clone(),
                reason: format!("provider returned {}: {}", status, detail),
            });
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| GenerationError::ProviderFailed {
                    provider: self.model.clone(),
                    reason: e.to_string(),
                })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyCompletion)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted provider for tests: always succeeds or always fails
    pub struct ScriptedProvider {
        pub name: String,
        pub response: Result<String, String>,
        pub calls: AtomicUsize,
    }

    impl ScriptedProvider {
        pub fn answering(name: &str, text: &str) -> Self {
            Self {
                name: name.to_string(),
                response: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(name: &str, reason: &str) -> Self {
            Self {
                name: name.to_string(),
                response: Err(reason.to_string()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl GenerationProvider for ScriptedProvider {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_message: &str,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(reason) => Err(GenerationError::ProviderFailed {
                    provider: self.name.clone(),
                    reason: reason.clone(),
                }),
            }
        }

        fn name(&self) -> &str {
            &self.name
        }
    }
}
