//! Retrieval: per-run vector index and cross-encoder reranking

mod index;
mod rerank;

pub use index::VectorIndex;
pub use rerank::{rerank, CrossEncoderReranker, Reranker};
