//! LLM provider abstraction and model routing

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::types::Generation;

use super::ollama::OllamaLlm;
use super::openai::OpenAiLlm;

/// Trait for LLM answer generation
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one system + user exchange and return the answer with token usage
    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<Generation>;

    /// Model being used
    fn model(&self) -> &str;
}

/// Maps a run's `model_name` to a provider
pub trait LlmResolver: Send + Sync {
    fn resolve(&self, model_name: &str) -> Result<Arc<dyn LlmProvider>>;
}

/// Chat message shared by the OpenAI and Ollama wire formats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// Which API serves a model name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmBackend {
    /// OpenAI chat completions (`gpt-*`, `o1*`, `o3*`, `o4*`)
    OpenAi { model: String },
    /// Local Ollama server (`ollama/<model>`)
    Ollama { model: String },
}

impl LlmBackend {
    /// Route a model name
    pub fn from_model(model_name: &str) -> Result<Self> {
        let name = model_name.trim();

        if let Some(model) = name.strip_prefix("ollama/") {
            if model.is_empty() {
                return Err(Error::invalid_config("Missing model after 'ollama/'"));
            }
            return Ok(Self::Ollama {
                model: model.to_string(),
            });
        }

        if ["gpt-", "o1", "o3", "o4"].iter().any(|p| name.starts_with(p)) {
            return Ok(Self::OpenAi {
                model: name.to_string(),
            });
        }

        Err(Error::invalid_config(format!(
            "Unsupported model: {}",
            model_name
        )))
    }
}

/// Default resolver backed by the configured OpenAI and Ollama endpoints
pub struct LlmBackends {
    client: Client,
    config: LlmConfig,
}

impl LlmBackends {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

impl LlmResolver for LlmBackends {
    fn resolve(&self, model_name: &str) -> Result<Arc<dyn LlmProvider>> {
        let provider: Arc<dyn LlmProvider> = match LlmBackend::from_model(model_name)? {
            LlmBackend::OpenAi { model } => {
                let api_key = std::env::var("OPENAI_API_KEY")
                    .map_err(|_| Error::invalid_config("OPENAI_API_KEY is not set"))?;
                Arc::new(OpenAiLlm::new(
                    self.client.clone(),
                    &self.config.openai_base_url,
                    api_key,
                    model,
                    self.config.max_tokens,
                ))
            }
            LlmBackend::Ollama { model } => Arc::new(OllamaLlm::new(
                self.client.clone(),
                &self.config.ollama_base_url,
                model,
                self.config.max_tokens,
            )),
        };
        Ok(provider)
    }
}
