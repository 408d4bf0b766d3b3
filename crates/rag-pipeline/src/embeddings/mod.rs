//! Text embedding backends
//!
//! Supported model identifiers:
//! - `text-embedding-3-small`: OpenAI embeddings API (1536 dimensions)
//! - `sentence-transformers/all-MiniLM-L6-v2`: local ONNX (384 dimensions)
//! - `sentence-transformers/all-mpnet-base-v2`: local ONNX (768 dimensions)

pub(crate) mod download;
pub(crate) mod onnx;
mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ServiceConfig;
use crate::error::{Error, Result};

pub use onnx::OnnxEmbedder;
pub use openai::OpenAiEmbedder;

/// Trait for generating text embeddings
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, one per input in order
    ///
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Embedding dimensions
    fn dimensions(&self) -> usize;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Which implementation serves a model identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Hosted OpenAI embeddings
    OpenAi { model: String, dimensions: usize },
    /// Local sentence-transformers ONNX export
    Onnx { model: String, dimensions: usize },
}

impl EmbeddingBackend {
    /// Resolve a model identifier
    pub fn from_model(model: &str) -> Result<Self> {
        match model {
            "text-embedding-3-small" => Ok(Self::OpenAi {
                model: model.to_string(),
                dimensions: 1536,
            }),
            "sentence-transformers/all-MiniLM-L6-v2" => Ok(Self::Onnx {
                model: model.to_string(),
                dimensions: 384,
            }),
            "sentence-transformers/all-mpnet-base-v2" => Ok(Self::Onnx {
                model: model.to_string(),
                dimensions: 768,
            }),
            other => Err(Error::invalid_config(format!(
                "Unsupported embedding model: {}",
                other
            ))),
        }
    }

    /// Output dimensions of the model
    pub fn dimensions(&self) -> usize {
        match self {
            Self::OpenAi { dimensions, .. } | Self::Onnx { dimensions, .. } => *dimensions,
        }
    }
}

/// Build the embedder for a model, downloading local weights if needed
pub async fn load_embedder(
    config: &ServiceConfig,
    model: &str,
) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match EmbeddingBackend::from_model(model)? {
        EmbeddingBackend::OpenAi { model, dimensions } => Arc::new(OpenAiEmbedder::new(
            &config.llm.openai_base_url,
            &model,
            dimensions,
            config.embeddings.batch_size,
            config.llm.timeout_secs,
        )?),
        EmbeddingBackend::Onnx { model, dimensions } => {
            Arc::new(OnnxEmbedder::new(&config.embeddings, &model, dimensions).await?)
        }
    };

    tracing::info!(
        "Loaded embedder {} ({} dimensions)",
        embedder.name(),
        embedder.dimensions()
    );
    Ok(embedder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_resolution() {
        assert_eq!(
            EmbeddingBackend::from_model("text-embedding-3-small")
                .unwrap()
                .dimensions(),
            1536
        );
        assert!(matches!(
            EmbeddingBackend::from_model("sentence-transformers/all-mpnet-base-v2").unwrap(),
            EmbeddingBackend::Onnx { dimensions: 768, .. }
        ));
        assert_eq!(
            EmbeddingBackend::from_model("sentence-transformers/all-MiniLM-L6-v2")
                .unwrap()
                .dimensions(),
            384
        );
    }

    #[test]
    fn test_unknown_model_rejected() {
        assert!(matches!(
            EmbeddingBackend::from_model("bert-base-uncased"),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
