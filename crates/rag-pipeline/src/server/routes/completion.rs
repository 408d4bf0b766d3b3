//! Chat completion endpoint

use std::path::{Path, PathBuf};

use axum::{
    extract::{Multipart, State},
    Json,
};
use tempfile::TempDir;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::CompletionResponse;

/// Request-scoped upload directory, removed when the request ends
struct UploadDir {
    dir: Option<TempDir>,
}

impl UploadDir {
    fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("rag-upload-").tempdir()?;
        Ok(Self { dir: Some(dir) })
    }

    fn path(&self) -> &Path {
        self.dir.as_ref().map(TempDir::path).unwrap_or_else(|| Path::new("."))
    }
}

impl Drop for UploadDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => tracing::debug!("Removed upload directory {}", path.display()),
                Err(e) => tracing::warn!(
                    "Failed to remove upload directory {}: {}",
                    path.display(),
                    e
                ),
            }
        }
    }
}

/// Text fields of the multipart form
#[derive(Debug, Default)]
struct CompletionForm {
    method: Option<String>,
    model_name: Option<String>,
    n_questions_per_chunk: Option<String>,
    chunk_size: Option<String>,
    words_per_chunk: Option<String>,
    sentences_per_chunk: Option<String>,
    delimiter: Option<String>,
    tokens_per_chunk: Option<String>,
    semantic_clusters: Option<String>,
    query: Option<String>,
}

impl CompletionForm {
    fn set(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "method" => &mut self.method,
            "model_name" => &mut self.model_name,
            "n_questions_per_chunk" => &mut self.n_questions_per_chunk,
            "chunk_size" => &mut self.chunk_size,
            "words_per_chunk" => &mut self.words_per_chunk,
            "sentences_per_chunk" => &mut self.sentences_per_chunk,
            "delimiter" => &mut self.delimiter,
            "tokens_per_chunk" => &mut self.tokens_per_chunk,
            "semantic_clusters" => &mut self.semantic_clusters,
            "query" => &mut self.query,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Build the run configuration; optional fields fall back to defaults
    fn into_config(self, file_paths: Vec<PathBuf>) -> Result<PipelineConfig> {
        let defaults = PipelineConfig::default();

        Ok(PipelineConfig {
            file_paths,
            method: required("method", self.method)?,
            model_name: required("model_name", self.model_name)?,
            n_questions_per_chunk: parse_count(
                "n_questions_per_chunk",
                Some(required("n_questions_per_chunk", self.n_questions_per_chunk)?),
                defaults.n_questions_per_chunk,
            )?,
            chunk_size: parse_count("chunk_size", self.chunk_size, defaults.chunk_size)?,
            words_per_chunk: parse_count(
                "words_per_chunk",
                self.words_per_chunk,
                defaults.words_per_chunk,
            )?,
            sentences_per_chunk: parse_count(
                "sentences_per_chunk",
                self.sentences_per_chunk,
                defaults.sentences_per_chunk,
            )?,
            delimiter: self.delimiter.unwrap_or(defaults.delimiter),
            tokens_per_chunk: parse_count(
                "tokens_per_chunk",
                self.tokens_per_chunk,
                defaults.tokens_per_chunk,
            )?,
            semantic_clusters: parse_count(
                "semantic_clusters",
                self.semantic_clusters,
                defaults.semantic_clusters,
            )?,
            query: self.query,
        })
    }
}

fn required(name: &str, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| Error::invalid_config(format!("Missing required field: {}", name)))
}

fn parse_count(name: &str, value: Option<String>, default: usize) -> Result<usize> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            Error::invalid_config(format!("{} must be an integer, got '{}'", name, raw))
        }),
    }
}

/// Keep only the final path component of a client-supplied filename
fn safe_filename(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// POST /chat/completion - run the pipeline over the uploaded files
pub async fn chat_completion(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CompletionResponse>> {
    let uploads = UploadDir::new()?;
    let mut file_paths = Vec::new();
    let mut form = CompletionForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        Error::invalid_config(format!("Failed to read multipart field: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();

        if name == "files" {
            let index = file_paths.len();
            let filename = field
                .file_name()
                .and_then(safe_filename)
                .unwrap_or_else(|| format!("upload_{}", index));

            let data = field.bytes().await.map_err(|e| {
                Error::internal(format!("Failed to read file {}: {}", filename, e))
            })?;

            // One subdirectory per upload so repeated names do not collide
            let dir = uploads.path().join(index.to_string());
            tokio::fs::create_dir_all(&dir).await?;
            let path = dir.join(&filename);
            tokio::fs::write(&path, &data).await?;

            tracing::info!("Received file: {} ({} bytes)", filename, data.len());
            file_paths.push(path);
            continue;
        }

        let value = field.text().await.map_err(|e| {
            Error::invalid_config(format!("Failed to read field {}: {}", name, e))
        })?;
        if !form.set(&name, value) {
            tracing::debug!("Ignoring unknown form field: {}", name);
        }
    }

    let config = form.into_config(file_paths)?;
    config.validate()?;

    let result = state.orchestrator().run(&config).await?;
    Ok(Json(CompletionResponse::success(result)))
}
