use actix_cors::Cors;
use actix_web::{
    http::header,
    middleware::{Compress, Logger},
    web, App, HttpServer,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod middleware;
mod models;
mod retrieval;
mod routes;
mod services;
mod state;
mod utils;

#[cfg(test)]
mod test_utils;

use config::Config;
use retrieval::{EmbeddingFactory, VectorDBFactory};
use routes::create_routes;
use services::{GeminiChat, RagEngine};
use state::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting UniVault RAG Backend");

    // Fails fast when GEMINI_API_KEY is missing
    let config = Config::from_env()?;
    info!("Configuration loaded from environment");

    let embedder = EmbeddingFactory::from_config(&config).await?;
    info!(
        "Embedding provider ready: {} ({:?})",
        embedder.model_name(),
        config.embedding_engine
    );

    let store = VectorDBFactory::from_config(&config).await?;
    info!("Vector store ready: {}", config.vector_db);

    let model = Arc::new(GeminiChat::from_config(&config));
    info!("Chat model: {}", config.chat_model);

    let rag = RagEngine::new(embedder, store, model, &config);
    info!("Using collection: {}", rag.collection());

    let bind_addr = format!("{}:{}", config.host, config.port);
    let cors_allow_origin = config.cors_allow_origin.clone();
    let state = web::Data::new(AppState::new(config, rag));

    info!("Server running at http://{}", bind_addr);

    HttpServer::new(move || {
        let cors = if cors_allow_origin == "*" {
            Cors::default()
                .allow_any_origin()
                .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION])
                .max_age(3600)
        } else {
            let mut cors = Cors::default();
            for origin in cors_allow_origin.split(',').map(|s| s.trim()) {
                cors = cors.allowed_origin(origin);
            }
            cors.allowed_methods(vec!["GET", "POST", "OPTIONS"])
                .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION])
                .max_age(3600)
        };

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(Compress::default())
            .wrap(Logger::default())
            .wrap(middleware::RequestLogging)
            .configure(create_routes)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
