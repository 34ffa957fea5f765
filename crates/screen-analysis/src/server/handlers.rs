//! Route handlers.

use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Query, State};
use axum::response::{Html, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use screen_analysis_core::{AnalysisRequest, AnalysisResponse, Backend, DEFAULT_PROMPT, VERSION};

use super::error::ApiError;
use super::AppState;

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Welcome to Screen Analysis API",
        "version": VERSION,
    }))
}

/// `GET /health`. Does not contact the backends.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": VERSION,
    }))
}

/// `GET /api/`: the capture page.
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let path = state.templates_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::warn!("Cannot read template {:?}: {}", path, e);
            Err(ApiError::not_found("Template index.html not found"))
        }
    }
}

/// `POST /api/analyze`
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e.body_text())))?;

    let response = state.analyzer.analyze(request).await?;
    Ok(Json(response))
}

/// Optional fields of an upload, from the query string or text parts.
#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    pub prompt: Option<String>,
    pub backend: Option<String>,
    pub model: Option<String>,
}

/// `POST /api/analyze/file`
pub async fn analyze_file(
    State(state): State<AppState>,
    Query(mut params): Query<UploadParams>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| upload_error(e.body_text()))?;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| upload_error(e.body_text()))? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let bytes = field.bytes().await.map_err(|e| upload_error(e.body_text()))?;
                file = Some(bytes.to_vec());
            }
            "prompt" => params.prompt = Some(text(field).await?),
            "backend" => params.backend = Some(text(field).await?),
            "model" => params.model = Some(text(field).await?),
            other => tracing::debug!("Ignoring multipart field {:?}", other),
        }
    }

    let bytes = file.ok_or_else(|| upload_error("missing `file` part"))?;
    if bytes.is_empty() {
        return Err(upload_error("uploaded file is empty"));
    }

    let response = state
        .analyzer
        .analyze_upload(
            bytes,
            params.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            params
                .backend
                .unwrap_or_else(|| Backend::RemoteLlm.as_str().to_string()),
            params.model.filter(|m| !m.is_empty()),
        )
        .await
        .map_err(ApiError::upload)?;
    Ok(Json(response))
}

async fn text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(|e| upload_error(e.body_text()))
}

fn upload_error(message: impl std::fmt::Display) -> ApiError {
    ApiError::bad_request(format!("Error processing image: {message}"))
}
