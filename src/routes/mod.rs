pub mod chat;
pub mod health;
pub mod upload;

use actix_web::web;

use crate::error::AppError;

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api")
                .route("/chat", web::post().to(chat::chat))
                .route("/upload", web::post().to(upload::upload_document)),
        );
}

/// Malformed or mistyped JSON bodies get the same `{"error": ...}` shape as
/// every other client error.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("Invalid request body: {}", err)).into()
    })
}
