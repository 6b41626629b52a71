use serde::{Deserialize, Serialize};

/// Configuration for text chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive windows
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Distance between the starts of two consecutive windows. Never zero.
    pub fn stride(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap).max(1)
    }
}

/// A chunk of a source document, ready to be embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// `{source}_{index}`
    pub id: String,
    pub text: String,
    /// Base name of the uploaded file
    pub source: String,
    /// Position among the surviving chunks of the document (0-based)
    pub index: usize,
}

impl DocumentChunk {
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "source": self.source,
            "chunk_id": self.index,
        })
    }
}

/// Split text into fixed-size overlapping windows.
///
/// Windows start every `chunk_size - chunk_overlap` characters and span at
/// most `chunk_size` characters. Each window is trimmed and blank windows
/// are dropped. Lengths are counted in `char`s so multi-byte text never
/// splits inside a code point.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    if text.is_empty() || config.chunk_size == 0 {
        return vec![];
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    (0..len)
        .step_by(config.stride())
        .filter_map(|start| {
            let end = (start + config.chunk_size).min(len);
            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}

/// Chunk a document and tag every window with its source and ordinal.
pub fn chunk_document(text: &str, source: &str, config: &ChunkingConfig) -> Vec<DocumentChunk> {
    chunk_text(text, config)
        .into_iter()
        .enumerate()
        .map(|(index, text)| DocumentChunk {
            id: format!("{}_{}", source, index),
            text,
            source: source.to_string(),
            index,
        })
        .collect()
}
