use super::types::{SearchHit, VectorDB, VectorError, VectorItem};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// In-process vector store persisted as one JSON file per collection.
///
/// Search is an exact cosine scan over every record, which is plenty for
/// the document volumes a single study workspace produces.
pub struct LocalVectorStore {
    root: Option<PathBuf>,
    collections: RwLock<HashMap<String, Collection>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Collection {
    records: BTreeMap<String, VectorItem>,
}

impl LocalVectorStore {
    /// Store that lives only in memory
    pub fn in_memory() -> Self {
        Self {
            root: None,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Open (or create) a store rooted at `root`, loading every collection
    /// file found there
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, VectorError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;

        let mut collections = HashMap::new();
        let mut entries = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let bytes = tokio::fs::read(&path).await?;
            let collection: Collection = serde_json::from_slice(&bytes).map_err(|e| {
                VectorError::SerializationError(format!(
                    "Failed to load collection '{}': {}",
                    name, e
                ))
            })?;

            debug!(
                "Loaded collection '{}' with {} records",
                name,
                collection.records.len()
            );
            collections.insert(name.to_string(), collection);
        }

        info!(
            "Opened local vector store at {} ({} collections)",
            root.display(),
            collections.len()
        );

        Ok(Self {
            root: Some(root),
            collections: RwLock::new(collections),
        })
    }

    async fn persist(&self, name: &str, collection: &Collection) -> Result<(), VectorError> {
        let Some(root) = &self.root else {
            return Ok(());
        };

        let bytes = serde_json::to_vec(collection)
            .map_err(|e| VectorError::SerializationError(e.to_string()))?;

        // Write then rename so a crash never leaves a truncated file behind
        let path = root.join(format!("{}.json", name));
        let tmp = root.join(format!("{}.json.tmp", name));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("Persisted collection '{}' to {}", name, path.display());
        Ok(())
    }
}

fn validate_collection_name(name: &str) -> Result<(), VectorError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && !name.starts_with('.');

    if valid {
        Ok(())
    } else {
        Err(VectorError::ConfigError(format!(
            "Invalid collection name: '{}'",
            name
        )))
    }
}

/// Cosine distance (1 - cosine similarity), matching Chroma's `cosine` space
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorDB for LocalVectorStore {
    async fn count(&self, collection_name: &str) -> Result<usize, VectorError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection_name)
            .map(|c| c.records.len())
            .unwrap_or(0))
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
        validate_collection_name(collection_name)?;

        let mut collections = self.collections.write().await;
        let current = collections.get(collection_name);

        let dim = current
            .and_then(|c| c.records.values().next())
            .map(|r| r.vector.len())
            .unwrap_or(items[0].vector.len());
        if let Some(bad) = items.iter().find(|item| item.vector.len() != dim) {
            return Err(VectorError::OperationError(format!(
                "Embedding dimension {} of '{}' does not match collection dimension {}",
                bad.vector.len(),
                bad.id,
                dim
            )));
        }

        // The map only changes once the new state is on disk
        let mut updated = current.cloned().unwrap_or_default();
        let count = items.len();
        for item in items {
            updated.records.insert(item.id.clone(), item);
        }

        self.persist(collection_name, &updated).await?;
        collections.insert(collection_name.to_string(), updated);

        info!(
            "Upserted {} items into collection: {}",
            count, collection_name
        );
        Ok(())
    }

    async fn search(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, VectorError> {
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(collection_name) else {
            return Ok(Vec::new());
        };

        if let Some(dim) = collection.records.values().next().map(|r| r.vector.len()) {
            if vector.len() != dim {
                return Err(VectorError::OperationError(format!(
                    "Query dimension {} does not match collection dimension {}",
                    vector.len(),
                    dim
                )));
            }
        }

        let mut hits: Vec<SearchHit> = collection
            .records
            .values()
            .map(|record| SearchHit {
                id: record.id.clone(),
                text: record.text.clone(),
                metadata: record.metadata.clone(),
                distance: cosine_distance(&vector, &record.vector),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(limit);

        debug!(
            "Search returned {} results from collection: {}",
            hits.len(),
            collection_name
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: &str, vector: Vec<f32>) -> VectorItem {
        VectorItem {
            id: id.to_string(),
            text: format!("text of {}", id),
            vector,
            metadata: json!({ "source": "doc.pdf", "chunk_id": 0 }),
        }
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let store = LocalVectorStore::in_memory();
        assert_eq!(store.count("nothing").await.unwrap(), 0);
        assert!(store.search("nothing", vec![1.0], 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_orders_by_distance_and_limits() {
        let store = LocalVectorStore::in_memory();
        store
            .upsert(
                "docs",
                vec![
                    item("far", vec![0.0, 1.0]),
                    item("near", vec![1.0, 0.1]),
                    item("exact", vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("docs", vec![1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
        assert_eq!(hits[0].text, "text of exact");
        assert_eq!(hits[0].metadata["source"], "doc.pdf");
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let store = LocalVectorStore::in_memory();
        store.upsert("docs", vec![item("a", vec![1.0, 0.0])]).await.unwrap();

        let mut replacement = item("a", vec![0.0, 1.0]);
        replacement.text = "updated".to_string();
        store.upsert("docs", vec![replacement]).await.unwrap();

        assert_eq!(store.count("docs").await.unwrap(), 1);
        let hits = store.search("docs", vec![0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].text, "updated");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let store = LocalVectorStore::in_memory();
        store.upsert("docs", vec![item("a", vec![1.0, 0.0])]).await.unwrap();

        let err = store
            .upsert("docs", vec![item("b", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::OperationError(_)));
        assert_eq!(store.count("docs").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mixed_dimensions_in_first_batch_are_rejected() {
        let store = LocalVectorStore::in_memory();
        let err = store
            .upsert("docs", vec![item("a", vec![1.0, 0.0]), item("b", vec![1.0])])
            .await
            .unwrap_err();

        assert!(matches!(err, VectorError::OperationError(_)));
        assert_eq!(store.count("docs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch_is_rejected() {
        let store = LocalVectorStore::in_memory();
        store.upsert("docs", vec![item("a", vec![1.0, 0.0])]).await.unwrap();

        let err = store.search("docs", vec![1.0, 0.0, 0.0], 1).await.unwrap_err();
        assert!(matches!(err, VectorError::OperationError(_)));
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_collection_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("index");
        let store = LocalVectorStore::open(&root).await.unwrap();
        store.upsert("docs", vec![item("a", vec![1.0, 0.0])]).await.unwrap();

        std::fs::remove_dir_all(&root).unwrap();

        let err = store
            .upsert("docs", vec![item("b", vec![0.0, 1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::Io(_)));
        assert_eq!(store.count("docs").await.unwrap(), 1);

        let err = store
            .upsert("fresh", vec![item("c", vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::Io(_)));
        assert_eq!(store.count("fresh").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_collection_name() {
        let store = LocalVectorStore::in_memory();
        let err = store
            .upsert("../escape", vec![item("a", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = LocalVectorStore::open(dir.path()).await.unwrap();
            store
                .upsert("univault_docs", vec![item("a", vec![1.0, 0.0]), item("b", vec![0.0, 1.0])])
                .await
                .unwrap();
        }

        assert!(dir.path().join("univault_docs.json").exists());
        assert!(!dir.path().join("univault_docs.json.tmp").exists());

        let reopened = LocalVectorStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.count("univault_docs").await.unwrap(), 2);
        let hits = reopened.search("univault_docs", vec![0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].id, "b");
    }
}
