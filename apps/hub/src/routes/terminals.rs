//! # Terminal Routes
//!
//! Terminal registration and listing. The role recorded here is what the
//! realtime bus trusts at WebSocket connect time.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use harbor_core::validation::validate_required;
use harbor_core::TerminalRole;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTerminalRequest {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<TerminalRole>,
}

/// `POST /api/terminals/register`
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterTerminalRequest>,
) -> ApiResult<Json<Value>> {
    validate_required("id", &body.id)?;

    let terminal = state
        .db
        .terminals()
        .register(&body.id, body.name.as_deref(), body.role.unwrap_or_default())
        .await?;

    info!(terminal_id = %terminal.id, role = ?terminal.role, "Terminal registered");
    Ok(Json(json!({ "terminal": terminal })))
}

/// `GET /api/terminals`
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let terminals = state.db.terminals().list().await?;
    Ok(Json(json!({ "terminals": terminals })))
}

/// `GET /api/terminals/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(terminal_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let terminal = state
        .db
        .terminals()
        .get(&terminal_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Terminal", &terminal_id))?;

    Ok(Json(json!({ "terminal": terminal })))
}
