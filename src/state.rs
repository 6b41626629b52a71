use std::sync::Arc;

use crate::config::Config;
use crate::services::RagEngine;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rag: Arc<RagEngine>,
}

impl AppState {
    pub fn new(config: Config, rag: RagEngine) -> Self {
        Self {
            config: Arc::new(config),
            rag: Arc::new(rag),
        }
    }
}
