//! Typed service errors and their mapping to HTTP responses.
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Errors surfaced by the services.
///
/// A caller asking for another user's record gets `Forbidden`, an unknown id
/// gets `NotFound`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The referenced record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The record exists but belongs to another user.
    #[error("you don't have permission to {0}")]
    Forbidden(&'static str),

    /// The request body or parameters are malformed.
    #[error("{0}")]
    Validation(String),

    /// The request clashes with an existing record, e.g. a registered email.
    #[error("{0}")]
    Conflict(String),

    /// Missing or wrong credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Anything the caller can't fix. Details are logged, never returned.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::Validation(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        AppError::NotFound("record")
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(e) => {
                error!(error = ?e, "unhandled internal error");
                "Something went wrong".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: self.kind(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
