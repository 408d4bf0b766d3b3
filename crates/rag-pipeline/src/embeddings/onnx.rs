//! ONNX Runtime sentence embeddings
//!
//! Runs a sentence-transformers ONNX export, mean-pools the last hidden
//! state under the attention mask and L2-normalises the result.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use tokenizers::{EncodeInput, Encoding, Tokenizer};

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

use super::download::ensure_model_files;
use super::EmbeddingProvider;

/// Local ONNX sentence embedder
pub struct OnnxEmbedder {
    inner: Arc<EmbedderModel>,
}

struct EmbedderModel {
    /// Model repository id
    model: String,
    /// ONNX Runtime session
    session: Mutex<Session>,
    /// HuggingFace tokenizer
    tokenizer: Tokenizer,
    /// Whether the graph takes `token_type_ids` (BERT yes, MPNet no)
    token_types: bool,
    dimensions: usize,
    max_length: usize,
    batch_size: usize,
}

impl OnnxEmbedder {
    /// Download (if needed) and load the model
    pub async fn new(config: &EmbeddingConfig, model: &str, dimensions: usize) -> Result<Self> {
        tracing::info!("Initializing ONNX embedder with model: {}", model);

        let files = ensure_model_files(model, &config.cache_dir, Error::Embedding).await?;
        let session = load_session(&files.model, Error::Embedding)?;
        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| Error::embedding(format!("Failed to load tokenizer: {}", e)))?;
        let token_types = accepts_token_types(&session);

        tracing::info!("ONNX embedder ready ({} dimensions)", dimensions);

        Ok(Self {
            inner: Arc::new(EmbedderModel {
                model: model.to_string(),
                session: Mutex::new(session),
                tokenizer,
                token_types,
                dimensions,
                max_length: config.max_length,
                batch_size: config.batch_size.max(1),
            }),
        })
    }
}

impl EmbedderModel {
    fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_chunk(batch)?);
        }
        Ok(embeddings)
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inputs: Vec<EncodeInput> = texts.iter().map(|t| t.as_str().into()).collect();
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| Error::embedding(format!("Tokenization failed: {}", e)))?;

        let batch = EncodedBatch::new(&encodings, self.max_length);
        let mut session = self.session.lock();
        let (shape, hidden) = run_session(
            &mut session,
            &batch,
            self.token_types,
            "last_hidden_state",
            Error::Embedding,
        )?;

        let hidden_size = shape.get(2).copied().unwrap_or(self.dimensions);
        if hidden_size != self.dimensions {
            return Err(Error::embedding(format!(
                "Model produced {} dimensions, expected {}",
                hidden_size, self.dimensions
            )));
        }

        Ok(mean_pool(&hidden, &batch, hidden_size))
    }
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Empty embedding result"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = Arc::clone(&self.inner);
        let texts = texts.to_vec();
        run_blocking(move || model.embed_all(&texts)).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions
    }

    fn name(&self) -> &str {
        &self.inner.model
    }
}

/// Run tokenization and inference on the blocking pool
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
}

/// Build an optimised session from an ONNX file
pub(crate) fn load_session(path: &Path, err: fn(String) -> Error) -> Result<Session> {
    Session::builder()
        .map_err(|e| err(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| err(format!("Failed to set optimization level: {}", e)))?
        .with_intra_threads(4)
        .map_err(|e| err(format!("Failed to set threads: {}", e)))?
        .commit_from_file(path)
        .map_err(|e| err(format!("Failed to load model {}: {}", path.display(), e)))
}

pub(crate) fn accepts_token_types(session: &Session) -> bool {
    session.inputs.iter().any(|input| input.name == "token_type_ids")
}

/// Padded, row-major model inputs for one batch
pub(crate) struct EncodedBatch {
    pub batch_size: usize,
    pub seq_len: usize,
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub token_type_ids: Vec<i64>,
}

impl EncodedBatch {
    /// Pad to the longest encoding, truncating at `max_length` tokens
    pub fn new(encodings: &[Encoding], max_length: usize) -> Self {
        let batch_size = encodings.len();
        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(max_length)
            .max(1);

        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();

            for j in 0..ids.len().min(seq_len) {
                input_ids[i * seq_len + j] = ids[j] as i64;
                attention_mask[i * seq_len + j] = mask[j] as i64;
                token_type_ids[i * seq_len + j] = types[j] as i64;
            }
        }

        Self {
            batch_size,
            seq_len,
            input_ids,
            attention_mask,
            token_type_ids,
        }
    }
}

/// Run the session and copy out the named output (or the first one)
pub(crate) fn run_session(
    session: &mut Session,
    batch: &EncodedBatch,
    token_types: bool,
    output_name: &str,
    err: fn(String) -> Error,
) -> Result<(Vec<usize>, Vec<f32>)> {
    let shape = vec![batch.batch_size, batch.seq_len];

    let input_ids = Tensor::from_array((shape.clone(), batch.input_ids.clone().into_boxed_slice()))
        .map_err(|e| err(format!("Input tensor creation failed: {}", e)))?;
    let attention_mask =
        Tensor::from_array((shape.clone(), batch.attention_mask.clone().into_boxed_slice()))
            .map_err(|e| err(format!("Attention mask tensor creation failed: {}", e)))?;

    let mut inputs = vec![
        ("input_ids", input_ids.into_dyn()),
        ("attention_mask", attention_mask.into_dyn()),
    ];
    if token_types {
        let token_type_ids =
            Tensor::from_array((shape, batch.token_type_ids.clone().into_boxed_slice()))
                .map_err(|e| err(format!("Token type tensor creation failed: {}", e)))?;
        inputs.push(("token_type_ids", token_type_ids.into_dyn()));
    }

    let outputs = session
        .run(inputs)
        .map_err(|e| err(format!("Inference failed: {}", e)))?;

    let output_iter: Vec<_> = outputs.iter().collect();
    let output = output_iter
        .iter()
        .find(|(name, _)| *name == output_name)
        .or_else(|| output_iter.first())
        .map(|(_, v)| v)
        .ok_or_else(|| err("No output tensor".to_string()))?;

    let (tensor_shape, tensor_data) = output
        .try_extract_tensor::<f32>()
        .map_err(|e| err(format!("Failed to extract tensor: {}", e)))?;

    let dims: Vec<usize> = tensor_shape.iter().map(|&d| d as usize).collect();
    Ok((dims, tensor_data.to_vec()))
}

/// Attention-masked mean pooling followed by L2 normalisation
fn mean_pool(hidden: &[f32], batch: &EncodedBatch, hidden_size: usize) -> Vec<Vec<f32>> {
    let seq_len = batch.seq_len;
    let mut embeddings = Vec::with_capacity(batch.batch_size);

    for i in 0..batch.batch_size {
        let mut sum = vec![0.0f32; hidden_size];
        let mut count = 0.0f32;

        for j in 0..seq_len {
            let mask = batch.attention_mask[i * seq_len + j] as f32;
            if mask > 0.0 {
                let offset = (i * seq_len + j) * hidden_size;
                for (k, value) in sum.iter_mut().enumerate() {
                    if let Some(h) = hidden.get(offset + k) {
                        *value += h * mask;
                    }
                }
                count += mask;
            }
        }

        if count > 0.0 {
            sum.iter_mut().for_each(|v| *v /= count);
        }
        l2_normalize(&mut sum);
        embeddings.push(sum);
    }

    embeddings
}

pub(crate) fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
}
