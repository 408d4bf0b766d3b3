//! Document types produced by the loader

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Supported file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Plain text file
    Txt,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "txt" => Self::Txt,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a path's extension
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Check if this is a supported file type
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "Word Document (.docx)",
            Self::Txt => "Text File",
            Self::Unknown => "Unknown",
        }
    }
}

/// A loaded document. Immutable once read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Path the content was read from
    pub path: PathBuf,
    /// Extracted text content
    pub content: String,
}

impl Document {
    /// Create a new document
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// File type derived from the path
    pub fn file_type(&self) -> FileType {
        FileType::from_path(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_extension("PDF"), FileType::Pdf);
        assert_eq!(FileType::from_extension("docx"), FileType::Docx);
        assert_eq!(FileType::from_extension("txt"), FileType::Txt);
        assert_eq!(FileType::from_extension("doc"), FileType::Unknown);
        assert_eq!(FileType::from_path(Path::new("notes/a.TXT")), FileType::Txt);
        assert_eq!(FileType::from_path(Path::new("README")), FileType::Unknown);
        assert!(!FileType::Unknown.is_supported());
    }
}
