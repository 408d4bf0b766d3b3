//! OpenAI chat completions client

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Generation;

use super::llm::{ChatMessage, LlmProvider};

/// OpenAI chat completions provider
pub struct OpenAiLlm {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl OpenAiLlm {
    pub fn new(client: Client, base_url: &str, api_key: String, model: String, max_tokens: u32) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            max_tokens,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiLlm {
    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<Generation> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(prompt)],
            max_tokens: self.max_tokens,
        };

        tracing::info!("Generating answer with model: {}", self.model);
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::llm(format!("Chat completion request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::llm(format!(
                "Chat completion failed: HTTP {} - {}",
                status, body
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::llm(format!("Failed to parse chat completion: {}", e)))?;
        let total_time = start.elapsed().as_secs_f64();

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::llm("Chat completion returned no content"))?;

        let usage = chat.usage;
        Ok(Generation {
            model_response: content.trim().to_string(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: if usage.total_tokens > 0 {
                usage.total_tokens
            } else {
                usage.prompt_tokens + usage.completion_tokens
            },
            total_time,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}
