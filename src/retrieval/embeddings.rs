use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequest, EmbeddingInput},
    Client,
};
use futures_util::future::try_join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::config::{Config, EmbeddingEngine};

/// Error types for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Trait for embedding providers
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate one embedding per input text, in input order
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Gemini embeddings through the OpenAI-compatible endpoint
pub struct GeminiEmbeddings {
    client: Client<OpenAIConfig>,
    model: String,
    /// Semaphore to limit concurrent requests
    semaphore: Arc<Semaphore>,
}

impl GeminiEmbeddings {
    const BATCH_SIZE: usize = 50;
    const MAX_CONCURRENT: usize = 10;

    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);

        info!("Initialized Gemini embeddings: model={}", model);

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            semaphore: Arc::new(Semaphore::new(Self::MAX_CONCURRENT)),
        }
    }

    /// Embed texts in batches to stay under the request size limit. Batches
    /// run concurrently, capped by the semaphore, and results keep input order.
    async fn embed_batch(
        &self,
        texts: Vec<String>,
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let batches = texts
            .chunks(batch_size)
            .map(|chunk| self.embed_single_batch(chunk.to_vec()));

        let results = try_join_all(batches).await?;

        Ok(results.into_iter().flatten().collect())
    }

    async fn embed_single_batch(&self, batch: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let _permit = self.semaphore.acquire().await.map_err(|e| {
            EmbeddingError::ApiError(format!("Failed to acquire semaphore: {}", e))
        })?;

        debug!("Embedding batch of {} texts", batch.len());

        let expected = batch.len();
        let request = CreateEmbeddingRequest {
            model: self.model.clone(),
            input: EmbeddingInput::StringArray(batch),
            encoding_format: None,
            user: None,
            dimensions: None,
        };

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| EmbeddingError::ApiError(format!("Gemini API error: {}", e)))?;

        let mut data = response.data;
        data.sort_by_key(|d| d.index);

        if data.len() != expected {
            return Err(EmbeddingError::CountMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for GeminiEmbeddings {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        info!("Generating embeddings for {} texts", texts.len());
        self.embed_batch(texts, Self::BATCH_SIZE).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Map a short model name to its HuggingFace repository
pub fn local_model_repo(model_name: &str) -> &'static str {
    match model_name {
        "all-minilm-l6-v2" | "all-MiniLM-L6-v2" => "sentence-transformers/all-MiniLM-L6-v2",
        "bge-base-en-v1.5" => "BAAI/bge-base-en-v1.5",
        "bge-small-en-v1.5" => "BAAI/bge-small-en-v1.5",
        _ => "sentence-transformers/all-MiniLM-L6-v2",
    }
}

/// Sentence-transformers model run in-process with candle
#[cfg(feature = "embeddings")]
pub struct LocalEmbeddings {
    model_name: String,
    inner: Arc<local::LoadedModel>,
}

#[cfg(feature = "embeddings")]
impl LocalEmbeddings {
    /// Download (or reuse the cached) model and load it on the CPU
    pub async fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let repo_id = local_model_repo(model_name).to_string();
        info!("Loading local embedding model: {}", repo_id);

        let inner = tokio::task::spawn_blocking(move || local::LoadedModel::load(&repo_id))
            .await
            .map_err(|e| EmbeddingError::ModelError(format!("Task join error: {}", e)))??;

        Ok(Self {
            model_name: model_name.to_string(),
            inner: Arc::new(inner),
        })
    }
}

#[cfg(feature = "embeddings")]
#[async_trait::async_trait]
impl EmbeddingProvider for LocalEmbeddings {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding {} texts locally", texts.len());

        // CPU-bound inference runs off the async workers
        let model = self.inner.clone();
        tokio::task::spawn_blocking(move || model.embed(&texts))
            .await
            .map_err(|e| EmbeddingError::ModelError(format!("Task join error: {}", e)))?
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(feature = "embeddings")]
mod local {
    use super::EmbeddingError;
    use candle_core::{DType, Device, Tensor};
    use candle_nn::VarBuilder;
    use candle_transformers::models::bert::{BertModel, Config as BertConfig};
    use hf_hub::{api::sync::Api, Repo, RepoType};
    use tokenizers::{Tokenizer, TruncationParams};

    /// Longer inputs are cut to this many tokens, matching the
    /// sentence-transformers default for MiniLM.
    const MAX_TOKENS: usize = 256;

    fn model_err<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> EmbeddingError {
        move |e| EmbeddingError::ModelError(format!("{}: {}", context, e))
    }

    pub struct LoadedModel {
        model: BertModel,
        tokenizer: Tokenizer,
        device: Device,
    }

    impl LoadedModel {
        pub fn load(repo_id: &str) -> Result<Self, EmbeddingError> {
            let api = Api::new().map_err(model_err("Failed to initialize HF API"))?;
            let repo = api.repo(Repo::with_revision(
                repo_id.to_string(),
                RepoType::Model,
                "main".to_string(),
            ));

            let tokenizer_path = repo
                .get("tokenizer.json")
                .map_err(model_err("Failed to download tokenizer"))?;
            let config_path = repo
                .get("config.json")
                .map_err(model_err("Failed to download config"))?;
            let weights_path = repo
                .get("model.safetensors")
                .map_err(model_err("Failed to download model weights"))?;

            let mut tokenizer =
                Tokenizer::from_file(tokenizer_path).map_err(model_err("Failed to load tokenizer"))?;
            tokenizer
                .with_truncation(Some(TruncationParams {
                    max_length: MAX_TOKENS,
                    ..Default::default()
                }))
                .map_err(model_err("Failed to configure truncation"))?;

            let config_str =
                std::fs::read_to_string(config_path).map_err(model_err("Failed to read config"))?;
            let config: BertConfig =
                serde_json::from_str(&config_str).map_err(model_err("Failed to parse config"))?;

            let device = Device::Cpu;
            // SAFETY: the weights file is owned by the HF cache and not mutated while mapped
            let vb = unsafe {
                VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                    .map_err(model_err("Failed to load model weights"))?
            };

            let model = BertModel::load(vb, &config).map_err(model_err("Failed to load BERT model"))?;

            Ok(Self {
                model,
                tokenizer,
                device,
            })
        }

        pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let mut all_embeddings = Vec::with_capacity(texts.len());

            for text in texts {
                let encoding = self
                    .tokenizer
                    .encode(text.as_str(), true)
                    .map_err(model_err("Tokenization failed"))?;

                let token_ids = Tensor::new(encoding.get_ids(), &self.device)
                    .and_then(|t| t.unsqueeze(0))
                    .map_err(model_err("Failed to create token tensor"))?;
                let token_type_ids = Tensor::new(encoding.get_type_ids(), &self.device)
                    .and_then(|t| t.unsqueeze(0))
                    .map_err(model_err("Failed to create type tensor"))?;

                let attention_mask = Tensor::new(encoding.get_attention_mask(), &self.device)
                    .and_then(|t| t.unsqueeze(0))
                    .map_err(model_err("Failed to create mask tensor"))?;

                let hidden = self
                    .model
                    .forward(&token_ids, &token_type_ids, Some(&attention_mask))
                    .map_err(model_err("Model forward failed"))?;

                // Masked mean pooling, then L2 normalisation
                let mask = attention_mask
                    .to_dtype(DType::F32)
                    .and_then(|m| m.unsqueeze(2))
                    .map_err(model_err("Mean pooling failed"))?;
                let summed = hidden
                    .broadcast_mul(&mask)
                    .and_then(|t| t.sum(1))
                    .map_err(model_err("Mean pooling failed"))?;
                let pooled = mask
                    .sum(1)
                    .and_then(|count| summed.broadcast_div(&count))
                    .and_then(|t| t.squeeze(0))
                    .map_err(model_err("Mean pooling failed"))?;
                let norm = pooled
                    .sqr()
                    .and_then(|t| t.sum_all())
                    .and_then(|t| t.sqrt())
                    .map_err(model_err("Normalisation failed"))?;
                let normalized = pooled
                    .broadcast_div(&norm)
                    .map_err(model_err("Normalisation failed"))?;

                let embedding = normalized
                    .to_vec1::<f32>()
                    .map_err(model_err("Failed to convert to vec"))?;
                all_embeddings.push(embedding);
            }

            Ok(all_embeddings)
        }
    }
}

/// Factory for creating embedding providers
pub struct EmbeddingFactory;

impl EmbeddingFactory {
    /// Create the provider selected by `RAG_EMBEDDING_ENGINE`
    pub async fn from_config(config: &Config) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        info!(
            "Creating embedding provider: {:?} ({})",
            config.embedding_engine, config.embedding_model
        );

        match config.embedding_engine {
            EmbeddingEngine::Gemini => Ok(Arc::new(GeminiEmbeddings::new(
                &config.gemini_api_key,
                &config.gemini_base_url,
                &config.embedding_model,
            ))),
            EmbeddingEngine::Local => Self::create_local(&config.embedding_model).await,
        }
    }

    #[cfg(feature = "embeddings")]
    async fn create_local(model: &str) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        Ok(Arc::new(LocalEmbeddings::new(model).await?))
    }

    #[cfg(not(feature = "embeddings"))]
    async fn create_local(model: &str) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        Err(EmbeddingError::ConfigError(format!(
            "Local embedding model {} needs the 'embeddings' feature. Rebuild with it or use the gemini engine.",
            local_model_repo(model)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires GEMINI_API_KEY and network access
    async fn test_gemini_embeddings() {
        let key = std::env::var("GEMINI_API_KEY").unwrap();
        let provider = GeminiEmbeddings::new(
            &key,
            crate::config::DEFAULT_GEMINI_BASE_URL,
            "text-embedding-004",
        );

        let embeddings = provider
            .embed(vec!["Hello world".to_string(), "Test embedding".to_string()])
            .await
            .unwrap();

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), embeddings[1].len());
    }

    #[tokio::test]
    async fn test_empty_input_skips_api_call() {
        // An unreachable base URL proves no request is made.
        let provider = GeminiEmbeddings::new("key", "http://127.0.0.1:9", "text-embedding-004");
        let embeddings = provider.embed(vec![]).await.unwrap();
        assert!(embeddings.is_empty());
        assert_eq!(provider.model_name(), "text-embedding-004");
    }

    #[test]
    fn test_local_model_repo() {
        assert_eq!(
            local_model_repo("all-MiniLM-L6-v2"),
            "sentence-transformers/all-MiniLM-L6-v2"
        );
        assert_eq!(local_model_repo("bge-small-en-v1.5"), "BAAI/bge-small-en-v1.5");
        assert_eq!(
            local_model_repo("unknown"),
            "sentence-transformers/all-MiniLM-L6-v2"
        );
    }

    #[tokio::test]
    #[ignore] // Requires GEMINI_API_KEY and network access
    async fn test_gemini_embeddings_across_batches_keep_order() {
        let key = std::env::var("GEMINI_API_KEY").unwrap();
        let provider = GeminiEmbeddings::new(
            &key,
            crate::config::DEFAULT_GEMINI_BASE_URL,
            "text-embedding-004",
        );

        // Three batches of 50; the marker text sits in the last one
        let mut texts: Vec<String> = (0..120).map(|i| format!("filler sentence {}", i)).collect();
        texts[110] = "marker".to_string();

        let embeddings = provider.embed(texts).await.unwrap();
        let marker = provider.embed(vec!["marker".to_string()]).await.unwrap();

        assert_eq!(embeddings.len(), 120);
        let diff: f32 = embeddings[110]
            .iter()
            .zip(&marker[0])
            .map(|(a, b)| (a - b).abs())
            .sum();
        assert!(diff < 1e-3);
    }

    #[cfg(feature = "embeddings")]
    #[tokio::test]
    #[ignore] // Downloads the model from the HuggingFace hub
    async fn test_local_embeddings_truncate_long_input() {
        let provider = LocalEmbeddings::new("all-MiniLM-L6-v2").await.unwrap();

        let long_text = "photosynthesis ".repeat(340);
        assert!(long_text.len() > 5000);

        let embeddings = provider
            .embed(vec![long_text, "short text".to_string()])
            .await
            .unwrap();

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 384);
        let norm: f32 = embeddings[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[cfg(not(feature = "embeddings"))]
    #[tokio::test]
    async fn test_local_engine_requires_feature() {
        let config = Config {
            embedding_engine: EmbeddingEngine::Local,
            ..Config::default()
        };

        let err = EmbeddingFactory::from_config(&config).await.err().unwrap();
        assert!(matches!(err, EmbeddingError::ConfigError(_)));
    }
}
