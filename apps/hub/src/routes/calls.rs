//! # Caller-ID Routes
//!
//! The hardware parser lives outside the hub and posts call lifecycle
//! events here; the surface fans them out to connected terminals. No store
//! rows - a call that nobody saw is gone, and that is fine.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use harbor_core::new_id;
use harbor_core::validation::validate_required;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingCallRequest {
    number: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    line: Option<i64>,
}

/// `POST /api/calls/incoming`
pub async fn incoming(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request: IncomingCallRequest = serde_json::from_value(body)
        .map_err(|e| ApiError::validation(format!("Invalid call body: {e}")))?;
    validate_required("number", &request.number)?;

    let call_id = new_id();
    state
        .bus
        .broadcast(
            "call:incoming",
            json!({
                "id": call_id,
                "number": request.number,
                "name": request.name,
                "line": request.line,
            }),
            None,
        )
        .await;

    info!(call_id = %call_id, "Incoming call announced");
    Ok(Json(json!({ "id": call_id })))
}

/// `POST /api/calls/{id}/answer`
pub async fn answer(State(state): State<AppState>, Path(call_id): Path<String>) -> Json<Value> {
    state
        .bus
        .broadcast("call:answered", json!({ "id": call_id }), None)
        .await;
    Json(json!({ "success": true }))
}

/// `POST /api/calls/{id}/end`
pub async fn end(State(state): State<AppState>, Path(call_id): Path<String>) -> Json<Value> {
    state
        .bus
        .broadcast("call:ended", json!({ "id": call_id }), None)
        .await;
    Json(json!({ "success": true }))
}

/// `POST /api/calls/{id}/dismiss`
pub async fn dismiss(State(state): State<AppState>, Path(call_id): Path<String>) -> Json<Value> {
    state
        .bus
        .broadcast("call:dismissed", json!({ "id": call_id }), None)
        .await;
    Json(json!({ "success": true }))
}
