//! rag-pipeline: retrieval-augmented generation over uploaded documents
//!
//! A run loads PDF, DOCX and plain-text files, flattens them into one corpus,
//! splits it with one of seven chunking strategies, embeds the chunks into a
//! per-run vector index, retrieves and reranks candidates for a question and
//! asks an LLM to answer from the best contexts. The same pipeline is served
//! over HTTP (`POST /chat/completion`) and from the command line.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::{PipelineConfig, ServiceConfig};
pub use error::{Error, Result};
pub use pipeline::{PipelineOrchestrator, Providers};
pub use types::{
    document::{Document, FileType},
    response::{CompletionResponse, Generation, RerankedChunk, RetrievedChunk, RunResult},
};
