//! # Observability Routes
//!
//! `/health` for liveness probes and `/api/diagnostics` for the detailed
//! summary an operator looks at first.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use harbor_db::repository::diagnostics::{database_size_bytes, table_counts};

use crate::error::ApiResult;
use crate::state::AppState;

/// `GET /health` - public liveness check.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let healthy = state.db.health_check().await;
    Json(json!({ "status": if healthy { "ok" } else { "degraded" } }))
}

/// `GET /api/diagnostics`
pub async fn diagnostics(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let tables = table_counts(state.db.pool()).await?;
    let outbox = state.db.outbox().stats().await?;
    let oldest_pending_age_secs = state.db.outbox().oldest_pending_age_secs().await?;
    let db_size_bytes = database_size_bytes(state.db.pool()).await?;
    let connected_peers = state.bus.client_count().await;
    let configured = state.cloud.is_configured().await;

    Ok(Json(json!({
        "tables": tables,
        "outbox": {
            "stats": outbox,
            "oldestPendingAgeSecs": oldest_pending_age_secs,
        },
        "dbSizeBytes": db_size_bytes,
        "connectedPeers": connected_peers,
        "cloudConfigured": configured,
    })))
}
