//! Gateway request handlers
//!
//! Maps the two HTTP endpoints onto the coordination client's calls. Empty
//! or missing query text is rejected here, at the calling boundary; the host
//! never sees it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::client::{ClientError, HostClient};

use super::types::*;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<Mutex<HostClient>>,
    pub upload_dir: PathBuf,
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Query endpoint: `GET /query?text=...`
pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> impl IntoResponse {
    let text = match params.text {
        Some(text) if !text.trim().is_empty() => text,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("query text is missing")),
            )
                .into_response();
        }
    };

    debug!("Gateway query: {:?}", text);
    let mut client = state.client.lock().await;
    match client.query(&text).await {
        Ok(answer) => (StatusCode::OK, Json(QueryResponse { answer })).into_response(),
        Err(e) => {
            error!("Query failed: {}", e);
            error_status(&e)
        }
    }
}

/// Upload endpoint: `POST /upload` with a multipart `file` field. Saves the
/// file under the upload directory, then forwards an insert to the host.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("no file provided")),
            )
                .into_response();
        }
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(format!("malformed upload: {e}"))),
            )
                .into_response();
        }
    };

    let Some(filename) = field.file_name().map(sanitize_filename) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("uploaded file has no name")),
        )
            .into_response();
    };

    let bytes = match field.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(format!("failed to read upload: {e}"))),
            )
                .into_response();
        }
    };

    if let Err(e) = tokio::fs::create_dir_all(&state.upload_dir).await {
        error!("Cannot create upload dir: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("upload storage unavailable")),
        )
            .into_response();
    }

    let filepath = state.upload_dir.join(&filename);
    if let Err(e) = tokio::fs::write(&filepath, &bytes).await {
        error!("Cannot save upload '{}': {}", filepath.display(), e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("failed to save uploaded file")),
        )
            .into_response();
    }

    debug!("Gateway upload saved to: {}", filepath.display());
    let mut client = state.client.lock().await;
    match client
        .insert_document(&filepath.display().to_string(), None)
        .await
    {
        Ok(doc_id) => (
            StatusCode::OK,
            Json(UploadResponse {
                message: "file uploaded and inserted into index".to_string(),
                doc_id,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Insert failed: {}", e);
            error_status(&e)
        }
    }
}

/// Map client errors onto HTTP statuses with the flat error envelope
fn error_status(e: &ClientError) -> axum::response::Response {
    let status = match e {
        ClientError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        ClientError::Transport(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(e.to_string()))).into_response()
}

/// Strip path components so uploads cannot escape the upload directory
fn sanitize_filename(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    let cleaned: String = base
        .chars()
        .map(|c| if c == ':' || c == '\\' { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
