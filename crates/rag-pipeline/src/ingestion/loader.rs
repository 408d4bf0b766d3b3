//! Document loading and corpus flattening

use std::path::{Path, PathBuf};

use crate::types::{Document, FileType};

use super::parser::FileParser;

/// Loads input files into documents, skipping anything unreadable
pub struct DocumentLoader {
    file_paths: Vec<PathBuf>,
}

impl DocumentLoader {
    /// Create a loader over the given paths
    pub fn new(file_paths: Vec<PathBuf>) -> Self {
        Self { file_paths }
    }

    /// Read one file. `None` for unsupported, unreadable or empty files.
    pub fn read(path: &Path) -> Option<String> {
        match FileParser::parse_path(path) {
            Ok(text) if !text.is_empty() => {
                tracing::debug!(
                    "Extracted {} chars from {} ({})",
                    text.len(),
                    path.display(),
                    FileType::from_path(path).display_name()
                );
                Some(text)
            }
            Ok(_) => {
                tracing::warn!("No text extracted from {}, skipping", path.display());
                None
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Load every readable file in input order
    pub fn load(&self) -> Vec<Document> {
        if self.file_paths.is_empty() {
            tracing::warn!("No file paths provided");
            return Vec::new();
        }

        let documents: Vec<Document> = self
            .file_paths
            .iter()
            .filter_map(|path| Self::read(path).map(|content| Document::new(path, content)))
            .collect();

        let skipped = self.file_paths.len() - documents.len();
        tracing::info!(
            "Loaded {} of {} files ({} skipped)",
            documents.len(),
            self.file_paths.len(),
            skipped
        );

        documents
    }

    /// Join document contents with newlines into one trimmed corpus
    pub fn flatten(documents: &[Document]) -> String {
        documents
            .iter()
            .map(|doc| doc.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}
