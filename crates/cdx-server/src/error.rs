use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use cdx_access::AccessError;
use cdx_format::MalformedRecord;
use cdx_store::StoreError;

use crate::oracle::OracleError;

/// Application errors that map to an HTTP response. Admin routes render
/// these as JSON problem details; ingest/query routes render them as plain
/// text via [`TextError`] instead, since their success bodies are also
/// plain text.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("malformed record: {0}")]
    MalformedRecord(#[from] MalformedRecord),

    #[error("unknown collection {0:?}")]
    UnknownCollection(String),

    #[error("unknown policy {0}")]
    UnknownPolicy(u64),

    #[error("the --listen-fd flag is not yet supported")]
    ListenFdUnsupported,

    #[error("store error")]
    Store(#[from] StoreError),

    #[error("access control error")]
    Access(#[from] AccessError),

    #[error("access oracle error")]
    Oracle(#[from] OracleError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedRecord(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownCollection(_) => StatusCode::NOT_FOUND,
            AppError::UnknownPolicy(_) => StatusCode::BAD_REQUEST,
            AppError::ListenFdUnsupported => StatusCode::NOT_IMPLEMENTED,
            AppError::Store(StoreError::UnknownCollection(_)) => StatusCode::NOT_FOUND,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Access(AccessError::UnknownPolicy(_)) => StatusCode::BAD_REQUEST,
            AppError::Access(AccessError::UnknownRule(_)) => StatusCode::NOT_FOUND,
            AppError::Access(AccessError::DanglingPolicyRef(_)) => StatusCode::BAD_REQUEST,
            AppError::Access(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Oracle(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Serialize)]
struct ProblemDetails {
    title: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = %status, error = %self, "request failed");
        }
        let body = Json(ProblemDetails { title: self.to_string() });
        (status, body).into_response()
    }
}

/// Wraps [`AppError`] to render as `text/plain`, for the ingest and query
/// routes whose success bodies are also plain text.
pub struct TextError(pub AppError);

impl From<AppError> for TextError {
    fn from(err: AppError) -> Self {
        TextError(err)
    }
}

impl IntoResponse for TextError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            error!(status = %status, error = %self.0, "request failed");
        }
        (status, self.0.to_string()).into_response()
    }
}
