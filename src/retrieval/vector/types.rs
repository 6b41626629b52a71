use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Represents a single vector item to be stored in the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorItem {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
}

/// One nearest-neighbor match. Smaller distance means more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub metadata: serde_json::Value,
    pub distance: f32,
}

/// Error types for vector database operations
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstract trait for vector database operations.
///
/// Collections are created on first use. Methods on a collection that does
/// not exist yet behave as if it were empty.
#[async_trait]
pub trait VectorDB: Send + Sync {
    /// Number of records stored in a collection
    async fn count(&self, collection_name: &str) -> Result<usize, VectorError>;

    /// Insert records, replacing any existing record with the same id
    async fn upsert(&self, collection_name: &str, items: Vec<VectorItem>)
        -> Result<(), VectorError>;

    /// Return at most `limit` records nearest to `vector`, closest first
    async fn search(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, VectorError>;
}
