//! Error types for the RAG pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown chunking method, unknown model identifier or bad parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// File could not be read or parsed
    #[error("Failed to parse file '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Prompt template error
    #[error("Template error: {0}")]
    Template(String),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector index error
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// Reranker error
    #[error("Reranking failed: {0}")]
    Rerank(String),

    /// LLM error
    #[error("LLM error: {0}")]
    Llm(String),

    /// None of the inputs produced any text to index
    #[error("No readable content in the provided files")]
    EmptyCorpus,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Create a file parse error
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector index error
    pub fn vector_index(message: impl Into<String>) -> Self {
        Self::VectorIndex(message.into())
    }

    /// Create a rerank error
    pub fn rerank(message: impl Into<String>) -> Self {
        Self::Rerank(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this is a per-file read failure that the loader may skip
    pub fn is_file_level(&self) -> bool {
        matches!(self, Self::FileParse { .. } | Self::UnsupportedFileType(_))
    }

    /// Whether this came from an external collaborator call
    pub fn is_external_service(&self) -> bool {
        matches!(
            self,
            Self::Embedding(_) | Self::VectorIndex(_) | Self::Rerank(_) | Self::Llm(_) | Self::Http(_)
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Every failure surfaces as a generic 500 carrying the message.
        let client_side = self.is_file_level()
            || matches!(
                self,
                Error::InvalidConfiguration(_) | Error::Template(_) | Error::EmptyCorpus
            );
        if client_side {
            tracing::warn!("Request failed: {}", self);
        } else {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "detail": self.to_string(),
        }));

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::file_parse("a.pdf", "broken").is_file_level());
        assert!(Error::UnsupportedFileType("xyz".to_string()).is_file_level());
        assert!(!Error::EmptyCorpus.is_file_level());

        assert!(Error::llm("timeout").is_external_service());
        assert!(Error::rerank("bad shape").is_external_service());
        assert!(!Error::template("missing").is_external_service());
    }

    #[test]
    fn test_errors_map_to_internal_server_error() {
        let response = Error::invalid_config("Unknown chunking method: foo").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = Error::EmptyCorpus.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
