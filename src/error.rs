use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// AppError
///
/// Every failure a handler or extractor can surface. Each variant maps onto exactly
/// one HTTP status, and the body is always `{"detail": "<message>"}`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing, malformed, expired or orphaned bearer token.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// Login failure. Unknown user and wrong password are indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    /// The request body could not be parsed into the expected JSON shape. Syntax
    /// errors, a missing content type and schema mismatches all answer 422.
    #[error("{}", .0.body_text())]
    Payload(#[from] JsonRejection),

    /// Query string parameters of the wrong type.
    #[error("{}", .0.body_text())]
    Query(#[from] QueryRejection),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) | AppError::Payload(_) | AppError::Query(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            AppError::Internal(reason) => {
                // The cause stays in the logs; clients only learn that something failed.
                tracing::error!("internal error: {}", reason);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// RepositoryError
///
/// Failures raised by the persistence layer, independent of the backing store.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// A uniqueness constraint was violated (e.g. an existing username).
    #[error("{0}")]
    Conflict(String),

    /// A write pointed at a record that no longer exists (e.g. a deleted folder).
    #[error("{0}")]
    MissingReference(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be mapped back into a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(reason) => AppError::Conflict(reason),
            RepositoryError::MissingReference(reason) => AppError::Validation(reason),
            other => AppError::Internal(other.to_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
