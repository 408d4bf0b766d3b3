//! Core types for the RAG pipeline

pub mod document;
pub mod response;

pub use document::{Document, FileType};
pub use response::{
    CompletionResponse, Generation, HealthResponse, RerankedChunk, RetrievedChunk, RunResult,
};
