pub mod generator;
pub mod models;
pub mod prompt;
pub mod providers;
pub mod sanitize;
pub mod templates;

use crate::config::LlmConfig;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

/// A text completion backend. Responses are untrusted free text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    fn name(&self) -> &str;
}

pub struct LlmManager {
    provider: Box<dyn CompletionProvider>,
}

impl LlmManager {
    /// `Ok(None)` when AI generation is switched off.
    pub fn new(config: &LlmConfig) -> Result<Option<Self>, LlmError> {
        let provider: Box<dyn CompletionProvider> = match config.backend.as_str() {
            "openai" | "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "none" | "" => return Ok(None),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Some(Self { provider }))
    }

    pub fn with_provider(provider: Box<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.provider.complete(prompt).await
    }
}
