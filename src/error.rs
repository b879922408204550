//! Error taxonomy for the forum core
//!
//! Every operation surfaces its failure directly to the caller; there is no
//! local retry or suppression. `Validation` errors carry the offending field
//! names so clients can highlight them.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type ForumResult<T> = Result<T, ForumError>;

#[derive(Debug, Error)]
pub enum ForumError {
    #[error("validation failed on fields: {}", .0.join(", "))]
    Validation(Vec<&'static str>),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("authentication required")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Programming-error-class fault (e.g. a post/thread mismatch when
    /// marking a best answer). Should never occur from valid callers.
    #[error("invariant violated: {0}")]
    Invariant(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ForumError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Invariant(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::Forbidden(_) => "forbidden",
            Self::Unauthorized => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::Invariant(_) => "invariant",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ForumError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            error!("Internal error: {:#}", e);
        }

        let status = self.status_code();
        let body = match &self {
            Self::Validation(fields) => json!({
                "kind": self.kind(),
                "error": self.to_string(),
                "fields": fields,
            }),
            _ => json!({
                "kind": self.kind(),
                "error": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
