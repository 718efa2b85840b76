//! # Error Types
//!
//! Domain-specific error types for harbor-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  harbor-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  harbor-db errors     → DbError   (store failures)                     │
//! │  harbor-sync errors   → SyncError (cloud/engine failures)              │
//! │  apps/hub errors      → ApiError  (what terminals see, with HTTP code) │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Terminal     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested entity does not exist locally.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The entity is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Voiding an already-voided sale
    /// - Closing a cash drawer that is not open
    /// - Bumping a completed kitchen order
    #[error("{entity} {id} is {current_status}, cannot {operation}")]
    InvalidState {
        entity: String,
        id: String,
        current_status: String,
        operation: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn invalid_state(
        entity: impl Into<String>,
        id: impl Into<String>,
        current_status: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        CoreError::InvalidState {
            entity: entity.into(),
            id: id.into(),
            current_status: current_status.into(),
            operation: operation.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field length is outside the allowed range.
    #[error("{field} must be between {min} and {max} characters")]
    LengthOutOfRange {
        field: String,
        min: usize,
        max: usize,
    },

    /// Numeric value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (bad characters, unparsable value).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Collection is empty where at least one element is required.
    #[error("{field} must contain at least one entry")]
    Empty { field: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
