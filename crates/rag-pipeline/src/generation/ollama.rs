//! Ollama chat client

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Generation;

use super::llm::{ChatMessage, LlmProvider};

/// Ollama `/api/chat` provider
pub struct OllamaLlm {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    num_predict: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

impl OllamaLlm {
    pub fn new(client: Client, base_url: &str, model: String, max_tokens: u32) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<Generation> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(prompt)],
            stream: false,
            options: ChatOptions {
                num_predict: self.max_tokens,
            },
        };

        tracing::info!("Generating answer with Ollama model: {}", self.model);
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::llm(format!("Generation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::llm(format!(
                "Generation failed: HTTP {} - {}",
                status, body
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::llm(format!("Failed to parse generation response: {}", e)))?;

        Ok(Generation {
            model_response: chat.message.content.trim().to_string(),
            prompt_tokens: chat.prompt_eval_count,
            completion_tokens: chat.eval_count,
            total_tokens: chat.prompt_eval_count + chat.eval_count,
            total_time: start.elapsed().as_secs_f64(),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let raw = r#"{
            "model": "llama3",
            "message": {"role": "assistant", "content": "It is a weighting."},
            "done": true,
            "prompt_eval_count": 42,
            "eval_count": 7
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.message.content, "It is a weighting.");
        assert_eq!(parsed.prompt_eval_count, 42);
        assert_eq!(parsed.eval_count, 7);
    }

    #[test]
    fn test_missing_counts_default_to_zero() {
        let raw = r#"{"message": {"role": "assistant", "content": "ok"}}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.prompt_eval_count + parsed.eval_count, 0);
    }
}
