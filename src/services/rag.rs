use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::retrieval::{
    chunk_document, extract_text, ChunkingConfig, EmbeddingProvider, VectorDB, VectorItem,
};
use crate::services::CompletionModel;
use crate::utils::prompt;

/// Ingests documents into the vector index and answers questions against it.
///
/// One engine is shared by every request. It holds no locks of its own and
/// relies on the thread safety of its collaborators.
pub struct RagEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorDB>,
    model: Arc<dyn CompletionModel>,
    collection: String,
    chunking: ChunkingConfig,
    top_k: usize,
}

impl RagEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorDB>,
        model: Arc<dyn CompletionModel>,
        config: &Config,
    ) -> Self {
        Self {
            embedder,
            store,
            model,
            collection: config.collection_name.clone(),
            chunking: ChunkingConfig::new(config.chunk_size, config.chunk_overlap),
            top_k: config.top_k,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Extract, chunk, embed and store a document. Returns the number of
    /// chunks written, 0 when the document has no text.
    pub async fn ingest_file(&self, path: &Path) -> AppResult<usize> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::BadRequest(format!("Invalid file path: {}", path.display())))?;

        let text = extract_text(path).await?;
        if text.trim().is_empty() {
            info!("No text extracted from {}", filename);
            return Ok(0);
        }

        let chunks = chunk_document(&text, &filename, &self.chunking);
        if chunks.is_empty() {
            return Ok(0);
        }

        debug!(
            "Split {} ({} chars) into {} chunks",
            filename,
            text.chars().count(),
            chunks.len()
        );

        let embeddings = self
            .embedder
            .embed(chunks.iter().map(|c| c.text.clone()).collect())
            .await?;

        if embeddings.len() != chunks.len() {
            return Err(AppError::Internal(format!(
                "Embedding provider returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let items: Vec<VectorItem> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, vector)| VectorItem {
                metadata: chunk.metadata(),
                id: chunk.id,
                text: chunk.text,
                vector,
            })
            .collect();

        let count = items.len();
        self.store.upsert(&self.collection, items).await?;

        info!("Ingested {} chunks from {}", count, filename);
        Ok(count)
    }

    /// Answer a question. Failures are reported inside the returned text
    /// rather than as an error.
    pub async fn query(&self, query_text: &str) -> String {
        match self.try_query(query_text).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Error in RagEngine::query: {}", e);
                format!(
                    "I encountered an error while processing your request: {}",
                    e
                )
            }
        }
    }

    pub async fn try_query(&self, query_text: &str) -> AppResult<String> {
        let prompt = self.build_prompt(query_text).await?;
        let answer = self.model.generate(&prompt).await?;
        Ok(answer)
    }

    async fn build_prompt(&self, query_text: &str) -> AppResult<String> {
        let count = self.store.count(&self.collection).await?;

        if count == 0 {
            debug!("Collection {} is empty, answering from general knowledge", self.collection);
            return Ok(prompt::no_documents_prompt(query_text));
        }

        let k = self.top_k.min(count);
        let query_vector = self
            .embedder
            .embed(vec![query_text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal("No embedding generated for query".to_string()))?;

        let hits = self.store.search(&self.collection, query_vector, k).await?;
        debug!("Retrieved {} of {} chunks for query", hits.len(), count);

        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        let context = prompt::join_context(&texts);

        Ok(prompt::context_prompt(&context, query_text))
    }
}
