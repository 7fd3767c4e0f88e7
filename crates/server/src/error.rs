//! HTTP error mapping.
//!
//! Handlers return `AppResult<T>`; `AppError` turns every failure into a
//! status code and a JSON body:
//! - 404 `{"detail": ...}` for unknown lists, entries and malformed ids
//! - 400 `{"field": ["message"]}` for validation failures
//! - 409 `{"detail": ...}` plus `Retry-After` when a list is busy

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use ranking::{FieldErrors, RankError};

/// Seconds a client should wait before retrying a conflicted write
const RETRY_AFTER_SECS: &str = "1";

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Rank(#[from] RankError),

    /// Path segment that is not a valid id
    #[error("Not found.")]
    NotFound,

    /// Body that could not be parsed as the expected JSON
    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Rank(err @ RankError::NotFound { .. }) => not_found(err.to_string()),
            AppError::NotFound => not_found("Not found.".to_string()),
            AppError::Rank(RankError::Validation(errors)) => {
                (StatusCode::BAD_REQUEST, Json(errors)).into_response()
            }
            AppError::MalformedBody(message) => {
                let errors = FieldErrors::single("non_field_errors", message);
                (StatusCode::BAD_REQUEST, Json(errors)).into_response()
            }
            AppError::Rank(err @ RankError::ConcurrencyConflict { .. }) => {
                let mut response = (
                    StatusCode::CONFLICT,
                    Json(json!({ "detail": err.to_string() })),
                )
                    .into_response();
                response.headers_mut().insert(
                    header::RETRY_AFTER,
                    HeaderValue::from_static(RETRY_AFTER_SECS),
                );
                response
            }
            AppError::Rank(err) => {
                error!(error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

fn not_found(detail: String) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": detail }))).into_response()
}
