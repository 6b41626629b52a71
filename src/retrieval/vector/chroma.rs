use super::types::{SearchHit, VectorDB, VectorError, VectorItem};
use async_trait::async_trait;
use chromadb::client::{ChromaAuthMethod, ChromaClient as ChromaDbClient, ChromaClientOptions};
use chromadb::collection::{ChromaCollection, CollectionEntries, QueryOptions};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// ChromaDB client for a Chroma server
pub struct ChromaClient {
    client: ChromaDbClient,
}

/// Configuration for ChromaDB
#[derive(Debug, Clone)]
pub struct ChromaConfig {
    pub url: Option<String>,
    pub database: String,
    pub auth: ChromaAuthMethod,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            url: None,
            database: "default_database".to_string(),
            auth: ChromaAuthMethod::None,
        }
    }
}

impl ChromaConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        // A full CHROMA_URL wins over host/port/ssl
        let url = if let Ok(chroma_url) = std::env::var("CHROMA_URL") {
            Some(chroma_url)
        } else if let Ok(host) = std::env::var("CHROMA_HTTP_HOST") {
            let port = std::env::var("CHROMA_HTTP_PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(8000);

            let ssl = std::env::var("CHROMA_HTTP_SSL")
                .unwrap_or_else(|_| "false".to_string())
                .to_lowercase()
                == "true";

            let protocol = if ssl { "https" } else { "http" };

            Some(format!("{}://{}:{}", protocol, host, port))
        } else {
            None
        };

        let database =
            std::env::var("CHROMA_DATABASE").unwrap_or_else(|_| "default_database".to_string());

        let auth = if let Ok(token) = std::env::var("CHROMA_AUTH_TOKEN") {
            ChromaAuthMethod::TokenAuth {
                token,
                header: chromadb::client::ChromaTokenHeader::Authorization,
            }
        } else {
            ChromaAuthMethod::None
        };

        Self {
            url,
            database,
            auth,
        }
    }
}

impl ChromaClient {
    pub async fn new(config: ChromaConfig) -> Result<Self, VectorError> {
        info!(
            "Initializing ChromaDB client: {:?} (database: {})",
            config.url, config.database
        );

        let options = ChromaClientOptions {
            url: config.url,
            database: config.database,
            auth: config.auth,
        };

        let client = ChromaDbClient::new(options).await.map_err(|e| {
            VectorError::ConnectionError(format!("Failed to connect to ChromaDB: {}", e))
        })?;

        info!("Successfully connected to ChromaDB");

        Ok(Self { client })
    }

    async fn get_or_create_collection(
        &self,
        collection_name: &str,
    ) -> Result<ChromaCollection, VectorError> {
        debug!("Getting or creating collection: {}", collection_name);

        self.client
            .get_or_create_collection(collection_name, None)
            .await
            .map_err(|e| {
                VectorError::DatabaseError(format!(
                    "Failed to get or create collection '{}': {}",
                    collection_name, e
                ))
            })
    }

    fn items_to_entries(items: &[VectorItem]) -> CollectionEntries<'_> {
        let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
        let embeddings: Vec<Vec<f32>> = items.iter().map(|item| item.vector.clone()).collect();
        let documents: Vec<&str> = items.iter().map(|item| item.text.as_str()).collect();
        let metadatas: Vec<Map<String, Value>> = items
            .iter()
            .map(|item| item.metadata.as_object().cloned().unwrap_or_default())
            .collect();

        CollectionEntries {
            ids,
            embeddings: Some(embeddings),
            metadatas: Some(metadatas),
            documents: Some(documents),
        }
    }
}

#[async_trait]
impl VectorDB for ChromaClient {
    async fn count(&self, collection_name: &str) -> Result<usize, VectorError> {
        let collection = self.get_or_create_collection(collection_name).await?;

        collection.count().await.map_err(|e| {
            VectorError::OperationError(format!(
                "Failed to count collection '{}': {}",
                collection_name, e
            ))
        })
    }

    async fn upsert(
        &self,
        collection_name: &str,
        items: Vec<VectorItem>,
    ) -> Result<(), VectorError> {
        if items.is_empty() {
            debug!("No items to upsert into collection: {}", collection_name);
            return Ok(());
        }

        info!(
            "Upserting {} items into collection: {}",
            items.len(),
            collection_name
        );

        let collection = self.get_or_create_collection(collection_name).await?;
        let entries = Self::items_to_entries(&items);

        collection.upsert(entries, None).await.map_err(|e| {
            VectorError::OperationError(format!(
                "Failed to upsert items into collection '{}': {}",
                collection_name, e
            ))
        })?;

        Ok(())
    }

    async fn search(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, VectorError> {
        debug!(
            "Searching collection '{}' with limit: {}",
            collection_name, limit
        );

        let collection = self.get_or_create_collection(collection_name).await?;

        let query_options = QueryOptions {
            query_embeddings: Some(vec![vector]),
            query_texts: None,
            n_results: Some(limit),
            where_metadata: None,
            where_document: None,
            include: Some(vec!["metadatas", "documents", "distances"]),
        };

        let result = collection.query(query_options, None).await.map_err(|e| {
            VectorError::OperationError(format!(
                "Failed to search collection '{}': {}",
                collection_name, e
            ))
        })?;

        // One query vector, so only the first row of each result matrix matters
        let ids = result.ids.into_iter().next().unwrap_or_default();
        let documents = result
            .documents
            .and_then(|docs| docs.into_iter().next())
            .unwrap_or_default();
        let metadatas = result
            .metadatas
            .and_then(|metas| metas.into_iter().next())
            .unwrap_or_default();
        let distances = result
            .distances
            .and_then(|dists| dists.into_iter().next())
            .unwrap_or_default();

        let hits: Vec<SearchHit> = ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| SearchHit {
                id,
                text: documents.get(i).cloned().unwrap_or_default(),
                metadata: metadatas
                    .get(i)
                    .cloned()
                    .flatten()
                    .map(Value::Object)
                    .unwrap_or(Value::Null),
                distance: distances.get(i).copied().unwrap_or(f32::MAX),
            })
            .collect();

        debug!(
            "Search returned {} results from collection: {}",
            hits.len(),
            collection_name
        );

        Ok(hits)
    }
}
