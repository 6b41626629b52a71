use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required but not set")]
    Missing(&'static str),

    #[error("Invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Where chunk embeddings are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingEngine {
    /// Gemini embedding API, remote.
    Gemini,
    /// Sentence-transformers model run in-process.
    Local,
}

impl EmbeddingEngine {
    pub fn default_model(&self) -> &'static str {
        match self {
            EmbeddingEngine::Gemini => "text-embedding-004",
            EmbeddingEngine::Local => "all-MiniLM-L6-v2",
        }
    }

    /// Remote and local vectors differ in dimension, so each engine gets its
    /// own collection.
    pub fn default_collection(&self) -> &'static str {
        match self {
            EmbeddingEngine::Gemini => "univault_docs",
            EmbeddingEngine::Local => "univault_docs_local",
        }
    }
}

impl FromStr for EmbeddingEngine {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(EmbeddingEngine::Gemini),
            "local" => Ok(EmbeddingEngine::Local),
            other => Err(ConfigError::Invalid {
                key: "RAG_EMBEDDING_ENGINE",
                message: format!("unsupported engine '{}', expected gemini or local", other),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    // Gemini
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub chat_model: String,

    // Embeddings
    pub embedding_engine: EmbeddingEngine,
    pub embedding_model: String,

    // Retrieval
    pub collection_name: String,
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,

    // Storage
    pub vector_db: String,
    pub vector_db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_size: usize,

    pub cors_allow_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        let engine = EmbeddingEngine::Gemini;
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,

            gemini_api_key: String::new(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            chat_model: "gemini-1.5-flash".to_string(),

            embedding_engine: engine,
            embedding_model: engine.default_model().to_string(),

            collection_name: engine.default_collection().to_string(),
            top_k: 3,
            chunk_size: 1000,
            chunk_overlap: 100,

            vector_db: "local".to_string(),
            vector_db_path: PathBuf::from("./chroma_db"),
            upload_dir: PathBuf::from("uploads"),
            max_upload_size: 50 * 1024 * 1024,

            cors_allow_origin: "*".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `.env` and the process environment.
    ///
    /// Fails when `GEMINI_API_KEY` is missing so the server never starts
    /// without credentials for the completion API.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        config.gemini_api_key = lookup("GEMINI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        if let Some(host) = lookup("HOST") {
            config.host = host;
        }

        if let Some(port) = lookup("PORT") {
            config.port = parse("PORT", &port)?;
        }

        if let Some(url) = lookup("GEMINI_BASE_URL") {
            config.gemini_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(model) = lookup("RAG_CHAT_MODEL") {
            config.chat_model = model;
        }

        if let Some(engine) = lookup("RAG_EMBEDDING_ENGINE") {
            config.embedding_engine = engine.parse()?;
        }

        config.embedding_model = lookup("RAG_EMBEDDING_MODEL")
            .unwrap_or_else(|| config.embedding_engine.default_model().to_string());

        config.collection_name = lookup("RAG_COLLECTION_NAME")
            .unwrap_or_else(|| config.embedding_engine.default_collection().to_string());

        if let Some(top_k) = lookup("RAG_TOP_K") {
            config.top_k = parse("RAG_TOP_K", &top_k)?;
        }

        if let Some(size) = lookup("CHUNK_SIZE") {
            config.chunk_size = parse("CHUNK_SIZE", &size)?;
        }

        if let Some(overlap) = lookup("CHUNK_OVERLAP") {
            config.chunk_overlap = parse("CHUNK_OVERLAP", &overlap)?;
        }

        if let Some(db) = lookup("VECTOR_DB") {
            config.vector_db = db.to_lowercase();
        }

        if let Some(path) = lookup("VECTOR_DB_PATH") {
            config.vector_db_path = PathBuf::from(path);
        }

        if let Some(dir) = lookup("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }

        if let Some(size) = lookup("MAX_UPLOAD_SIZE") {
            config.max_upload_size = parse("MAX_UPLOAD_SIZE", &size)?;
        }

        if let Some(origin) = lookup("CORS_ALLOW_ORIGIN") {
            config.cors_allow_origin = origin;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "CHUNK_SIZE",
                message: "must be greater than zero".to_string(),
            });
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Invalid {
                key: "CHUNK_OVERLAP",
                message: format!(
                    "{} must be smaller than CHUNK_SIZE ({})",
                    self.chunk_overlap, self.chunk_size
                ),
            });
        }

        if self.top_k == 0 {
            return Err(ConfigError::Invalid {
                key: "RAG_TOP_K",
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}
