//! # Sync Control Routes
//!
//! Observability and manual controls for both engines. Engine failures are
//! visible here, never through business routes.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiResult;
use crate::state::AppState;

/// `GET /api/sync/status`
pub async fn status(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let outbox = state.db.outbox().stats().await?;
    let entities = state.db.sync_state().list().await?;
    let configured = state.cloud.is_configured().await;

    Ok(Json(json!({
        "configured": configured,
        "pushing": state.push.is_draining(),
        "pulling": state.pull.is_running(),
        "outbox": outbox,
        "entities": entities,
    })))
}

/// `POST /api/sync/push` - request an immediate outbox drain.
pub async fn trigger_push(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.push.trigger().await?;
    info!("Manual push requested");
    Ok(Json(json!({ "triggered": true })))
}

/// `POST /api/sync/pull` - request an immediate pull cycle.
pub async fn trigger_pull(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.pull.trigger().await?;
    info!("Manual pull requested");
    Ok(Json(json!({ "triggered": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryDeadLettersRequest {
    #[serde(default)]
    pub entity_type: Option<String>,
}

/// `POST /api/sync/retry-dead-letters`
pub async fn retry_dead_letters(
    State(state): State<AppState>,
    Json(body): Json<RetryDeadLettersRequest>,
) -> ApiResult<Json<Value>> {
    let entity_type = body.entity_type;

    let revived = state
        .db
        .outbox()
        .retry_dead_letters(entity_type.as_deref())
        .await?;

    info!(revived, ?entity_type, "Dead letters reset to pending");
    Ok(Json(json!({ "revived": revived })))
}

/// `POST /api/sync/reset` - administrative cursor reset; the next cycle
/// full-fetches every entity.
pub async fn reset_cursors(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let cleared = state.db.sync_state().reset().await?;
    info!(cleared, "Sync cursors reset");
    Ok(Json(json!({ "cleared": cleared })))
}
