//! # Sync Error Types
//!
//! Error types for the cloud client and both engines. Engine failures never
//! propagate to HTTP callers; they surface through `sync_state`, the outbox,
//! and `/api/diagnostics`.

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Cloud credentials are missing; engines gate on `is_configured()`.
    #[error("Hub is not paired with the cloud (base URL or API key missing)")]
    NotConfigured,

    /// Non-2xx response from the cloud, outside the tolerated cases.
    #[error("Cloud request failed: {0}")]
    Http(String),

    /// Failed to build the HTTP client.
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Store failure while an engine was working.
    #[error("Database error: {0}")]
    Database(String),

    /// Payload could not be serialized or parsed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Failed to load the persisted hub config.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save the persisted hub config.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// Invalid configuration value.
    #[error("Invalid hub configuration: {0}")]
    InvalidConfig(String),

    /// Channel send/receive failed (engine control plumbing).
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<harbor_db::DbError> for SyncError {
    fn from(err: harbor_db::DbError) -> Self {
        SyncError::Database(err.to_string())
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::Http("HTTP 503: unavailable".into());
        assert!(err.to_string().contains("503"));
    }
}
