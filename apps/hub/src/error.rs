//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Taxonomy
//! ```text
//! ┌──────────────────────┬──────┬──────────────────────────────────────────┐
//! │ Kind                 │ Code │ Examples                                 │
//! ├──────────────────────┼──────┼──────────────────────────────────────────┤
//! │ Input (caller fault) │ 400  │ malformed body, missing field            │
//! │ Conflict             │ 400  │ voiding a voided sale, closing a closed  │
//! │                      │      │ drawer (descriptive message)             │
//! │ Auth                 │ 401  │ missing/invalid session                  │
//! │ Rate limited         │ 429  │ 11th PIN attempt in the window           │
//! │ Not found            │ 404  │ resource by id                           │
//! │ Store/internal       │ 500  │ SQL failure (transaction rolled back)    │
//! └──────────────────────┴──────┴──────────────────────────────────────────┘
//! ```
//!
//! Responses carry `{"error": "<message>"}`. Sync engine failures never
//! reach this type; they surface through `/api/sync/status`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use harbor_core::{CoreError, ValidationError};
use harbor_db::DbError;
use harbor_sync::SyncError;

/// API error returned from HTTP handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    /// 400 - structural problem with the request.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 400 - the entity is not in a state that allows the operation.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 401 - missing or invalid session, or failed PIN.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// 404 - resource by id.
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{entity} not found: {id}"))
    }

    /// 429 - PIN rate limit tripped.
    pub fn rate_limited() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many PIN attempts, try again later",
        )
    }

    /// 500 - the hub itself failed; the transaction already rolled back.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
                Self::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            _ => {
                tracing::error!(?err, "Store error in request handler");
                Self::internal("Internal store error")
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            CoreError::InvalidState { .. } => Self::conflict(err.to_string()),
            CoreError::Validation(_) => Self::validation(err.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        tracing::error!(?err, "Sync control error in request handler");
        Self::internal(err.to_string())
    }
}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;
