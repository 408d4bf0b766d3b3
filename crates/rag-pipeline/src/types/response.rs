//! Retrieval, generation and API response types

use serde::{Deserialize, Serialize};

/// Candidate returned by the vector index, nearest first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    /// Chunk identifier (its position in the chunk sequence)
    pub id: String,
    /// Chunk text
    pub text: String,
    /// Distance to the query vector (lower is nearer)
    pub distance: f32,
}

/// Candidate after cross-encoder scoring, highest score first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RerankedChunk {
    /// Chunk identifier
    pub id: String,
    /// Chunk text
    pub text: String,
    /// Relevance score from the reranker
    pub score: f32,
}

/// Output of one LLM call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Generation {
    /// Generated answer text, trimmed
    pub model_response: String,
    /// Tokens in the prompt
    pub prompt_tokens: u32,
    /// Tokens in the completion
    pub completion_tokens: u32,
    /// Prompt plus completion tokens
    pub total_tokens: u32,
    /// Wall-clock seconds spent in the call
    pub total_time: f64,
}

/// Result of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Run identifier
    pub run_id: String,
    /// Generated answer text
    pub model_response: String,
    /// Tokens in the prompt
    pub prompt_tokens: u32,
    /// Tokens in the completion
    pub completion_tokens: u32,
    /// Prompt plus completion tokens
    pub total_tokens: u32,
    /// Seconds spent in generation
    pub total_time: f64,
    /// Number of chunks indexed for this run
    pub chunk_count: usize,
    /// Contexts placed into the prompt, best first
    pub contexts: Vec<RerankedChunk>,
}

impl RunResult {
    /// Assemble a run result from the generation output
    pub fn new(
        run_id: String,
        generation: Generation,
        chunk_count: usize,
        contexts: Vec<RerankedChunk>,
    ) -> Self {
        Self {
            run_id,
            model_response: generation.model_response,
            prompt_tokens: generation.prompt_tokens,
            completion_tokens: generation.completion_tokens,
            total_tokens: generation.total_tokens,
            total_time: generation.total_time,
            chunk_count,
            contexts,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" when the process can answer
    pub status: String,
}

impl HealthResponse {
    /// Healthy status
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

/// Envelope for `/chat/completion`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// "success" on a completed run
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// The run result
    pub data: RunResult,
}

impl CompletionResponse {
    /// Wrap a successful run
    pub fn success(data: RunResult) -> Self {
        Self {
            status: "success".to_string(),
            message: "Chat completion generated successfully".to_string(),
            data,
        }
    }
}
