pub mod chunking;
pub mod embeddings;
pub mod extraction;
pub mod vector;

pub use chunking::{chunk_document, ChunkingConfig, DocumentChunk};
pub use embeddings::{EmbeddingError, EmbeddingFactory, EmbeddingProvider};
pub use extraction::{extract_text, ExtractionError};
pub use vector::{SearchHit, VectorDB, VectorDBFactory, VectorError, VectorItem};
