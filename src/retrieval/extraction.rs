use std::path::Path;

use lopdf::Document;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read PDF: {0}")]
    Pdf(String),

    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    PlainText,
}

impl DocumentFormat {
    /// Detect the format from magic bytes, falling back to the extension.
    pub fn detect(path: &Path, bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            return Some(DocumentFormat::Pdf);
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())?;

        match ext.as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "txt" | "md" | "markdown" | "csv" => Some(DocumentFormat::PlainText),
            _ => None,
        }
    }
}

/// Extract the full text of a document on disk.
///
/// PDF pages are extracted in page order and each page's text is followed
/// by a newline.
pub async fn extract_text(path: &Path) -> Result<String, ExtractionError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_text_blocking(&path))
        .await
        .map_err(|e| ExtractionError::Task(e.to_string()))?
}

pub fn extract_text_blocking(path: &Path) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(path)?;

    match DocumentFormat::detect(path, &bytes) {
        Some(DocumentFormat::Pdf) => extract_pdf_text(&bytes),
        Some(DocumentFormat::PlainText) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        None => Err(ExtractionError::UnsupportedFormat(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        )),
    }
}

pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let document = Document::load_mem(bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?;

    let pages = document.get_pages();
    debug!("Extracting text from {} PDF pages", pages.len());

    let mut text = String::new();
    for page_number in pages.keys() {
        let page_text = document
            .extract_text(&[*page_number])
            .map_err(|e| ExtractionError::Pdf(format!("page {}: {}", page_number, e)))?;
        text.push_str(&page_text);
        text.push('\n');
    }

    Ok(text)
}
