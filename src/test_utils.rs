//! Fakes for the external collaborators, shared by unit tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::Config;
use crate::retrieval::vector::LocalVectorStore;
use crate::retrieval::{EmbeddingError, EmbeddingProvider, SearchHit, VectorDB, VectorError, VectorItem};
use crate::services::{CompletionError, CompletionModel, RagEngine};
use crate::state::AppState;

pub fn test_config() -> Config {
    Config {
        gemini_api_key: "test-key".to_string(),
        ..Config::default()
    }
}

/// App state backed by fakes and an in-memory index. Uploads land in `upload_dir`.
pub fn test_state(upload_dir: &Path) -> AppState {
    test_state_with_model(upload_dir, FakeCompletion::echo())
}

pub fn test_state_with_model(upload_dir: &Path, model: FakeCompletion) -> AppState {
    let config = Config {
        upload_dir: upload_dir.to_path_buf(),
        ..test_config()
    };
    let rag = RagEngine::new(
        Arc::new(FakeEmbedder),
        Arc::new(LocalVectorStore::in_memory()),
        Arc::new(model),
        &config,
    );
    AppState::new(config, rag)
}

/// Hashed bag-of-words embedder. Texts sharing words end up close together.
#[derive(Default)]
pub struct FakeEmbedder;

impl FakeEmbedder {
    const DIMENSION: usize = 256;

    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; Self::DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            // FNV-1a
            let hash = word.to_lowercase().bytes().fold(0xcbf29ce484222325u64, |h, b| {
                (h ^ b as u64).wrapping_mul(0x100000001b3)
            });
            vector[(hash % Self::DIMENSION as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }

    fn model_name(&self) -> &str {
        "fake-bag-of-words"
    }
}

/// Completion model that either echoes the prompt back or always fails.
pub struct FakeCompletion {
    failure: Option<String>,
    last_prompt: Mutex<Option<String>>,
}

impl FakeCompletion {
    pub fn echo() -> Self {
        Self {
            failure: None,
            last_prompt: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for FakeCompletion {
    async fn generate(&self, prompt: &str) -> Result<String, CompletionError> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        match &self.failure {
            Some(message) => Err(CompletionError::ApiError(message.clone())),
            None => Ok(prompt.to_string()),
        }
    }

    fn model_name(&self) -> &str {
        "fake-echo"
    }
}

/// Wraps a store and records how it is called.
pub struct CountingStore<S> {
    inner: S,
    upserts: AtomicUsize,
    searches: AtomicUsize,
    last_limit: Mutex<Option<usize>>,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            upserts: AtomicUsize::new(0),
            searches: AtomicUsize::new(0),
            last_limit: Mutex::new(None),
        }
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn last_limit(&self) -> Option<usize> {
        *self.last_limit.lock().unwrap()
    }
}

#[async_trait]
impl<S: VectorDB> VectorDB for CountingStore<S> {
    async fn count(&self, collection_name: &str) -> Result<usize, VectorError> {
        self.inner.count(collection_name).await
    }

    async fn upsert(
        &self,
        collection_name: &str,
        items: Vec<VectorItem>,
    ) -> Result<(), VectorError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(collection_name, items).await
    }

    async fn search(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, VectorError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        *self.last_limit.lock().unwrap() = Some(limit);
        self.inner.search(collection_name, vector, limit).await
    }
}

/// Write a minimal PDF with one line of Courier text per page.
pub fn write_pdf(path: &Path, pages: &[&str]) {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(path).unwrap();
}
