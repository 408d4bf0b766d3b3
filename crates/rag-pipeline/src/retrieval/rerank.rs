//! Cross-encoder reranking

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokenizers::{EncodeInput, Tokenizer};

use crate::config::RerankerConfig;
use crate::embeddings::download::ensure_model_files;
use crate::embeddings::onnx::{
    accepts_token_types, load_session, run_blocking, run_session, EncodedBatch,
};
use crate::error::{Error, Result};
use crate::types::{RerankedChunk, RetrievedChunk};

/// Scores (query, document) pairs; higher means more relevant
#[async_trait]
pub trait Reranker: Send + Sync {
    /// One score per document, in input order
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

const SUPPORTED_MODELS: &[&str] = &["cross-encoder/ms-marco-MiniLM-L-6-v2"];

/// ONNX cross-encoder such as `cross-encoder/ms-marco-MiniLM-L-6-v2`
pub struct CrossEncoderReranker {
    inner: Arc<CrossEncoderModel>,
}

struct CrossEncoderModel {
    model: String,
    session: Mutex<ort::session::Session>,
    tokenizer: Tokenizer,
    token_types: bool,
    max_length: usize,
}

impl CrossEncoderReranker {
    /// Download (if needed) and load the configured cross-encoder
    pub async fn new(config: &RerankerConfig) -> Result<Self> {
        if !SUPPORTED_MODELS.contains(&config.model.as_str()) {
            return Err(Error::invalid_config(format!(
                "Unsupported reranker model: {}",
                config.model
            )));
        }
        tracing::info!("Initializing cross-encoder: {}", config.model);

        let files = ensure_model_files(&config.model, &config.cache_dir, Error::Rerank).await?;
        let session = load_session(&files.model, Error::Rerank)?;
        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| Error::rerank(format!("Failed to load tokenizer: {}", e)))?;

        Ok(Self {
            inner: Arc::new(CrossEncoderModel {
                model: config.model.clone(),
                token_types: accepts_token_types(&session),
                session: Mutex::new(session),
                tokenizer,
                max_length: config.max_length,
            }),
        })
    }
}

impl CrossEncoderModel {
    fn score_pairs(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let pairs: Vec<EncodeInput> = documents
            .iter()
            .map(|doc| (query, doc.as_str()).into())
            .collect();
        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| Error::rerank(format!("Tokenization failed: {}", e)))?;

        let batch = EncodedBatch::new(&encodings, self.max_length);
        let mut session = self.session.lock();
        let (shape, logits) =
            run_session(&mut session, &batch, self.token_types, "logits", Error::Rerank)?;

        // [batch, labels]; single-label models score with the first column
        let labels = shape.get(1).copied().unwrap_or(1).max(1);
        if logits.len() < documents.len() * labels {
            return Err(Error::rerank(format!(
                "Expected {} scores, got {}",
                documents.len(),
                logits.len() / labels
            )));
        }

        Ok((0..documents.len()).map(|i| logits[i * labels]).collect())
    }
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.inner);
        let query = query.to_string();
        let documents = documents.to_vec();
        run_blocking(move || model.score_pairs(&query, &documents)).await
    }

    fn name(&self) -> &str {
        &self.inner.model
    }
}

/// Score every candidate and sort by descending score.
///
/// The sort is stable: equal scores keep retrieval order. NaN scores sort last.
pub async fn rerank(
    reranker: &dyn Reranker,
    query: &str,
    candidates: Vec<RetrievedChunk>,
) -> Result<Vec<RerankedChunk>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let documents: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
    let scores = reranker.score(query, &documents).await?;
    if scores.len() != candidates.len() {
        return Err(Error::rerank(format!(
            "Reranker returned {} scores for {} candidates",
            scores.len(),
            candidates.len()
        )));
    }

    let mut ranked: Vec<RerankedChunk> = candidates
        .into_iter()
        .zip(scores)
        .map(|(chunk, score)| RerankedChunk {
            id: chunk.id,
            text: chunk.text,
            score,
        })
        .collect();

    ranked.sort_by(|a, b| descending(a.score, b.score));

    tracing::debug!("Reranked {} candidates with {}", ranked.len(), reranker.name());
    Ok(ranked)
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}
