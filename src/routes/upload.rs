use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::UploadResponse;
use crate::state::AppState;

// POST /api/upload
pub async fn upload_document(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> AppResult<HttpResponse> {
    let max_size = state.config.max_upload_size;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let content_disposition = field.content_disposition();
        let field_name = content_disposition
            .and_then(|cd| cd.get_name())
            .map(|s| s.to_string());
        let filename = content_disposition
            .and_then(|cd| cd.get_filename())
            .map(|s| s.to_string())
            .unwrap_or_default();

        if field_name.as_deref() != Some("file") {
            continue;
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
            if data.len() + chunk.len() > max_size {
                return Err(AppError::PayloadTooLarge(format!(
                    "File exceeds the maximum upload size of {} bytes",
                    max_size
                )));
            }
            data.extend_from_slice(&chunk);
        }
        upload = Some((filename, data));
    }

    let (raw_filename, data) =
        upload.ok_or_else(|| AppError::BadRequest("No file part".to_string()))?;
    let filename = sanitize_filename(&raw_filename)
        .ok_or_else(|| AppError::BadRequest("No selected file".to_string()))?;

    let upload_dir = &state.config.upload_dir;
    tokio::fs::create_dir_all(upload_dir).await?;
    let path = upload_dir.join(&filename);
    tokio::fs::write(&path, &data).await?;

    info!("Saved upload {} ({} bytes)", path.display(), data.len());

    let chunks = state.rag.ingest_file(&path).await?;

    Ok(HttpResponse::Ok().json(UploadResponse {
        message: format!("Successfully processed {}", filename),
        chunks,
    }))
}

/// Reduce a client supplied filename to its final path component. Returns
/// `None` when nothing usable is left.
fn sanitize_filename(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();

    match name {
        "" | "." | ".." => None,
        _ => Some(name.to_string()),
    }
}
