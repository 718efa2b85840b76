//! # Table Session Routes
//!
//! Seating and clearing tables. Both transitions broadcast `table:updated`
//! so every floor view stays current.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use harbor_core::validation::validate_required;
use harbor_core::{new_id, CheckStatus, OutboxStatus, TableSession};
use harbor_db::repository::ledger::LedgerRepository;
use harbor_db::{NewOutboxItem, OutboxRepository};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenTableRequest {
    table_id: String,
    #[serde(default)]
    guest_count: Option<i64>,
}

/// `POST /api/table-sessions`
pub async fn open_table(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request: OpenTableRequest = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::validation(format!("Invalid table session body: {e}")))?;
    validate_required("tableId", &request.table_id)?;

    let session = TableSession {
        id: new_id(),
        table_id: request.table_id.clone(),
        status: CheckStatus::Open,
        guest_count: request.guest_count,
        sync_status: OutboxStatus::Pending,
        opened_at: Utc::now(),
        closed_at: None,
    };

    let mut tx = state.db.pool().begin().await?;
    LedgerRepository::insert_table_session_tx(&mut tx, &session).await?;
    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity("table_session", &session.id, "create", body.to_string()),
    )
    .await?;
    tx.commit().await?;

    state
        .bus
        .broadcast(
            "table:updated",
            json!({ "tableId": session.table_id, "status": CheckStatus::Open }),
            None,
        )
        .await;

    info!(session_id = %session.id, table_id = %session.table_id, "Table session opened");
    Ok(Json(json!({ "id": session.id, "status": CheckStatus::Open })))
}

/// `POST /api/table-sessions/{id}/close`
pub async fn close_table(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let session = state
        .db
        .ledger()
        .get_table_session(&session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Table session", &session_id))?;

    if session.status != CheckStatus::Open {
        return Err(ApiError::conflict(format!(
            "Table session {session_id} is not open"
        )));
    }

    let mut tx = state.db.pool().begin().await?;
    LedgerRepository::close_table_session_tx(&mut tx, &session_id).await?;
    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity(
            "table_session",
            &session_id,
            "update",
            json!({ "id": session_id, "status": CheckStatus::Closed }).to_string(),
        ),
    )
    .await?;
    tx.commit().await?;

    state
        .bus
        .broadcast(
            "table:updated",
            json!({ "tableId": session.table_id, "status": CheckStatus::Closed }),
            None,
        )
        .await;

    info!(session_id = %session_id, "Table session closed");
    Ok(Json(json!({ "id": session_id, "status": CheckStatus::Closed })))
}
