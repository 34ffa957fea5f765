//! HTTP error mapping.
//!
//! Every error leaves the server as `{"detail": "<message>"}` with a status
//! derived from its class.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use screen_analysis_core::AnalysisError;
use serde_json::json;
use thiserror::Error;

/// Errors returned by HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    /// Wrap an error from the upload path. Client errors get the
    /// `Error processing image:` prefix; backend failures stay 500.
    pub fn upload(err: AnalysisError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(format!("Error processing image: {err}"))
        } else {
            ApiError::Analysis(err)
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Analysis(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Analysis(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Client error: {}", self);
        }

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
