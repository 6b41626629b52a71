use actix_web::{web, HttpResponse};
use tracing::debug;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{ChatRequest, ChatResponse};
use crate::state::AppState;

// POST /api/chat
pub async fn chat(
    state: web::Data<AppState>,
    payload: web::Json<ChatRequest>,
) -> AppResult<HttpResponse> {
    let request = payload.into_inner();

    let query = request
        .query
        .as_deref()
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("No query provided".to_string()))?;
    request.validate()?;

    debug!("Chat query: {}", query);

    // Retrieval and generation failures come back as text, never as an error
    let response = state.rag.query(query).await;

    Ok(HttpResponse::Ok().json(ChatResponse { response }))
}
