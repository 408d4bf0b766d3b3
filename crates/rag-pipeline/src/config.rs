//! Configuration for the RAG pipeline
//!
//! [`ServiceConfig`] is process-wide and loaded once at startup.
//! [`PipelineConfig`] is the immutable snapshot for a single run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::ingestion::ChunkingStrategy;

/// Prompt template used when none is configured
pub const DEFAULT_PROMPT_TEMPLATE: &str = "Given the following contexts, answer the question:\n\nContexts:\n -- \n\n{contexts}\n\nQuestion: {question}\n\nAnswer:";

/// System instruction sent with every generation request
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that provides concise and accurate answers based on the provided contexts.";

/// Question asked when a run does not supply one
pub const DEFAULT_QUERY: &str = "What is the attention mechanism?";

/// Process-wide service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Reranker configuration
    pub reranker: RerankerConfig,
    /// LLM configuration
    pub llm: LlmConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Prompt configuration
    pub prompt: PromptConfig,
}

impl ServiceConfig {
    /// Load configuration: defaults, then an optional TOML file, then env overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|e| Error::invalid_config(format!("Invalid config file: {}", e)))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("RAG_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("RAG_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::invalid_config(format!("Invalid RAG_PORT: {}", port)))?;
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model used to embed chunks and queries
    pub model: String,
    /// Model used to embed sentences for semantic chunking
    pub semantic_model: String,
    /// Maximum sequence length for local models
    pub max_length: usize,
    /// Texts per embedding batch (local inference or one API request)
    pub batch_size: usize,
    /// Cache directory for downloaded models
    pub cache_dir: PathBuf,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            semantic_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            max_length: 256,
            batch_size: 32,
            cache_dir: default_cache_dir(),
        }
    }
}

/// Cross-encoder reranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    /// Cross-encoder model identifier
    pub model: String,
    /// Maximum sequence length of a (query, document) pair
    pub max_length: usize,
    /// Cache directory for downloaded models
    pub cache_dir: PathBuf,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            model: "cross-encoder/ms-marco-MiniLM-L-6-v2".to_string(),
            max_length: 512,
            cache_dir: default_cache_dir(),
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL
    pub openai_base_url: String,
    /// Ollama base URL
    pub ollama_base_url: String,
    /// Completion token limit
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// System instruction sent with every prompt
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_base_url: "https://api.openai.com/v1".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            max_tokens: 1500,
            timeout_secs: 120,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Nearest neighbours fetched from the index
    pub top_k: usize,
    /// Reranked candidates placed into the prompt
    pub context_count: usize,
    /// Separator between contexts in the prompt
    pub context_separator: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            context_count: 3,
            context_separator: "\n\n -- \n\n".to_string(),
        }
    }
}

/// Prompt configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Template with `{contexts}` and `{question}` placeholders
    pub template: String,
    /// Question used when a run does not provide one
    pub default_query: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            default_query: DEFAULT_QUERY.to_string(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rag-pipeline")
        .join("models")
}

/// Configuration snapshot for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input files
    pub file_paths: Vec<PathBuf>,
    /// Chunking method selector
    pub method: String,
    /// Characters per chunk (character method)
    pub chunk_size: usize,
    /// Words per chunk (word method)
    pub words_per_chunk: usize,
    /// Sentences per chunk (sentence method)
    pub sentences_per_chunk: usize,
    /// Split delimiter (delimiter method)
    pub delimiter: String,
    /// Tokens per chunk (token method)
    pub tokens_per_chunk: usize,
    /// Upper bound on clusters (semantic method)
    pub semantic_clusters: usize,
    /// Generation model identifier
    pub model_name: String,
    /// Questions to generate per chunk
    pub n_questions_per_chunk: usize,
    /// Question to answer; falls back to the configured default
    pub query: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            file_paths: Vec::new(),
            method: "character".to_string(),
            chunk_size: 500,
            words_per_chunk: 100,
            sentences_per_chunk: 3,
            delimiter: "\n".to_string(),
            tokens_per_chunk: 512,
            semantic_clusters: 10,
            model_name: "gpt-4o-mini".to_string(),
            n_questions_per_chunk: 2,
            query: None,
        }
    }
}

impl PipelineConfig {
    /// Validate the run configuration without touching any collaborator
    pub fn validate(&self) -> Result<()> {
        ChunkingStrategy::from_config(self)?;

        if self.n_questions_per_chunk == 0 {
            return Err(Error::invalid_config(
                "n_questions_per_chunk must be a positive integer",
            ));
        }
        if self.model_name.trim().is_empty() {
            return Err(Error::invalid_config("model_name must not be empty"));
        }
        Ok(())
    }

    /// Resolve the question for this run
    pub fn query_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.query.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => q,
            _ => default,
        }
    }
}
