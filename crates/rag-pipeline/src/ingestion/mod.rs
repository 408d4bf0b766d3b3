//! Document loading, text extraction and chunking

mod chunker;
mod kmeans;
mod loader;
mod parser;
mod segment;

pub use chunker::{ChunkingMethod, ChunkingStrategy, TextChunker};
pub use kmeans::KMeans;
pub use loader::DocumentLoader;
pub use parser::FileParser;
pub use segment::{split_sentences, split_tokens};
