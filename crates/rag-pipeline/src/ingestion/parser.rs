//! PDF, DOCX and plain-text extraction

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::FileType;

/// Replace typographic glyphs that PDF fonts commonly emit with ASCII
fn cleanup_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace('\u{2014}', "--")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2022}', "* ")
        .replace('\u{2026}', "...")
        .replace('\u{00A0}', " ")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
}

/// Multi-format file parser
pub struct FileParser;

impl FileParser {
    /// Read a file from disk and extract its text
    pub fn parse_path(path: &Path) -> Result<String> {
        let file_type = FileType::from_path(path);
        let filename = path.display().to_string();

        if !file_type.is_supported() {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{}", e.to_lowercase()))
                .unwrap_or_default();
            return Err(Error::UnsupportedFileType(ext));
        }

        let data = std::fs::read(path)
            .map_err(|e| Error::file_parse(&filename, format!("Failed to read file: {}", e)))?;

        Self::parse(&filename, file_type, &data)
    }

    /// Extract text from in-memory file data; the result is trimmed
    pub fn parse(filename: &str, file_type: FileType, data: &[u8]) -> Result<String> {
        let content = match file_type {
            FileType::Pdf => Self::parse_pdf(filename, data)?,
            FileType::Docx => Self::parse_docx(filename, data)?,
            FileType::Txt => Self::parse_text(filename, data)?,
            FileType::Unknown => {
                return Err(Error::UnsupportedFileType(filename.to_string()));
            }
        };

        Ok(content.trim().to_string())
    }

    /// Parse PDF document
    fn parse_pdf(filename: &str, data: &[u8]) -> Result<String> {
        let content = Self::extract_pdf_with_timeout(filename, data)?;
        let content = cleanup_pdf_text(&content);

        if content.trim().is_empty() {
            return Err(Error::file_parse(
                filename,
                "No text content could be extracted from PDF",
            ));
        }

        Ok(content)
    }

    /// Extract PDF text with a timeout to prevent hangs on problematic fonts
    fn extract_pdf_with_timeout(filename: &str, data: &[u8]) -> Result<String> {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem(&data_vec);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(Duration::from_secs(60)) {
            Ok(Ok(text)) => {
                let _ = handle.join();
                Ok(text)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                tracing::warn!("pdf-extract failed for {}: {}, trying fallback", filename, e);
                Self::extract_pdf_text_fallback(filename, data)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::error!("PDF extraction timeout after 60s for {}", filename);
                Self::extract_pdf_text_fallback(filename, data)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("PDF extraction thread crashed for {}", filename);
                Self::extract_pdf_text_fallback(filename, data)
            }
        }
    }

    /// Fallback PDF text extraction using lopdf directly
    fn extract_pdf_text_fallback(filename: &str, data: &[u8]) -> Result<String> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Failed to load PDF: {}", e)))?;

        let mut all_text = String::new();
        for (page_num, page_id) in doc.get_pages() {
            match doc.get_page_content(page_id) {
                Ok(content) => {
                    let text = Self::extract_text_from_content(&content);
                    if !text.is_empty() {
                        all_text.push_str(&text);
                        all_text.push('\n');
                    }
                }
                Err(e) => {
                    tracing::debug!("Could not get content for page {}: {}", page_num, e);
                }
            }
        }

        if all_text.trim().is_empty() {
            return Err(Error::file_parse(
                filename,
                "PDF appears to be image-based or has no extractable text",
            ));
        }

        Ok(all_text)
    }

    /// Extract text between BT/ET operators of a PDF content stream
    fn extract_text_from_content(content: &[u8]) -> String {
        let content_str = String::from_utf8_lossy(content);
        let mut text = String::new();
        let mut in_text_block = false;
        let mut current_text = String::new();

        for line in content_str.lines() {
            let line = line.trim();

            if line == "BT" {
                in_text_block = true;
                continue;
            }

            if line == "ET" {
                in_text_block = false;
                if !current_text.is_empty() {
                    text.push_str(&current_text);
                    text.push(' ');
                    current_text.clear();
                }
                continue;
            }

            if in_text_block && (line.ends_with("Tj") || line.ends_with("TJ")) {
                if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
                    if start < end {
                        let decoded = line[start + 1..end]
                            .replace("\\n", "\n")
                            .replace("\\r", "\r")
                            .replace("\\t", "\t")
                            .replace("\\(", "(")
                            .replace("\\)", ")")
                            .replace("\\\\", "\\");
                        current_text.push_str(&decoded);
                    }
                }
            }
        }

        text
    }

    /// Parse DOCX document, one line per paragraph
    fn parse_docx(filename: &str, data: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(data)
            .map_err(|e| Error::file_parse(filename, e.to_string()))?;

        let mut content = String::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                content.push_str(&t.text);
                            }
                        }
                    }
                }
                content.push('\n');
            }
        }

        Ok(content)
    }

    /// Parse UTF-8 text
    fn parse_text(filename: &str, data: &[u8]) -> Result<String> {
        std::str::from_utf8(data)
            .map(str::to_string)
            .map_err(|e| Error::file_parse(filename, format!("Invalid UTF-8: {}", e)))
    }
}
