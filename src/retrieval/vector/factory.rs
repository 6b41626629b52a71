use super::chroma::{ChromaClient, ChromaConfig};
use super::local::LocalVectorStore;
use super::types::{VectorDB, VectorError};
use crate::config::Config;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Supported vector database types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorDBType {
    /// In-process store persisted under `VECTOR_DB_PATH`
    Local,
    /// Remote Chroma server
    Chroma,
}

impl FromStr for VectorDBType {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(VectorDBType::Local),
            "chroma" => Ok(VectorDBType::Chroma),
            _ => Err(VectorError::ConfigError(format!(
                "Unsupported VECTOR_DB type: {}. Supported types: local, chroma",
                s
            ))),
        }
    }
}

/// Factory for creating vector database clients
pub struct VectorDBFactory;

impl VectorDBFactory {
    pub async fn from_config(config: &Config) -> Result<Arc<dyn VectorDB>, VectorError> {
        let db_type = VectorDBType::from_str(&config.vector_db)?;
        info!("Creating vector database client: {:?}", db_type);

        match db_type {
            VectorDBType::Local => {
                let store = LocalVectorStore::open(&config.vector_db_path).await?;
                Ok(Arc::new(store))
            }
            VectorDBType::Chroma => {
                let client = ChromaClient::new(ChromaConfig::from_env()).await?;
                Ok(Arc::new(client))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_db_type_from_str() {
        assert_eq!(
            VectorDBType::from_str("chroma").unwrap(),
            VectorDBType::Chroma
        );
        assert_eq!(VectorDBType::from_str("LOCAL").unwrap(), VectorDBType::Local);
        assert!(VectorDBType::from_str("qdrant").is_err());
    }

    #[tokio::test]
    async fn test_local_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            vector_db_path: dir.path().join("index"),
            ..Config::default()
        };

        let store = VectorDBFactory::from_config(&config).await.unwrap();
        assert_eq!(store.count("univault_docs").await.unwrap(), 0);
        assert!(dir.path().join("index").is_dir());
    }
}
