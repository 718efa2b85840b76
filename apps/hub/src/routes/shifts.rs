//! # Shift Routes
//!
//! Shift start/end and break tracking. Breaks ride the parent shift's
//! outbox entity so the cloud sees one stream per shift.

use axum::extract::{Extension, Path, State};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use harbor_core::{new_id, OutboxStatus, ShiftBreak, ShiftLog, ShiftStatus};
use harbor_db::repository::shift::ShiftRepository;
use harbor_db::{NewOutboxItem, OutboxRepository};

use crate::auth::CurrentSession;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `POST /api/shifts/start`
pub async fn start_shift(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let shift = ShiftLog {
        id: new_id(),
        user_id: session.user_id.clone(),
        terminal_id: session.terminal_id.clone(),
        status: ShiftStatus::Open,
        sync_status: OutboxStatus::Pending,
        started_at: Utc::now(),
        ended_at: None,
    };

    let mut tx = state.db.pool().begin().await?;
    ShiftRepository::insert_tx(&mut tx, &shift).await?;
    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity("shift", &shift.id, "create", body.to_string()),
    )
    .await?;
    tx.commit().await?;

    info!(shift_id = %shift.id, user_id = %shift.user_id, "Shift started");
    Ok(Json(json!({ "id": shift.id, "status": ShiftStatus::Open })))
}

/// `POST /api/shifts/{id}/end`
pub async fn end_shift(
    State(state): State<AppState>,
    Path(shift_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let shift = state
        .db
        .shifts()
        .get_by_id(&shift_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Shift", &shift_id))?;

    if shift.status != ShiftStatus::Open {
        return Err(ApiError::conflict(format!("Shift {shift_id} is not open")));
    }

    let mut tx = state.db.pool().begin().await?;
    ShiftRepository::end_tx(&mut tx, &shift_id).await?;
    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity(
            "shift",
            &shift_id,
            "update",
            json!({ "id": shift_id, "status": ShiftStatus::Closed }).to_string(),
        ),
    )
    .await?;
    tx.commit().await?;

    info!(shift_id = %shift_id, "Shift ended");
    Ok(Json(json!({ "id": shift_id, "status": ShiftStatus::Closed })))
}

/// `POST /api/shifts/{id}/breaks` - start a break.
pub async fn start_break(
    State(state): State<AppState>,
    Path(shift_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let shift = state
        .db
        .shifts()
        .get_by_id(&shift_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Shift", &shift_id))?;

    if shift.status != ShiftStatus::Open {
        return Err(ApiError::conflict(format!("Shift {shift_id} is not open")));
    }

    let brk = ShiftBreak {
        id: new_id(),
        shift_id: shift_id.clone(),
        started_at: Utc::now(),
        ended_at: None,
    };

    let mut tx = state.db.pool().begin().await?;
    ShiftRepository::insert_break_tx(&mut tx, &brk).await?;
    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity(
            "shift",
            &shift_id,
            "update",
            json!({ "id": shift_id, "break": { "id": brk.id, "startedAt": brk.started_at } })
                .to_string(),
        ),
    )
    .await?;
    tx.commit().await?;

    info!(shift_id = %shift_id, break_id = %brk.id, "Break started");
    Ok(Json(json!({ "id": brk.id })))
}

/// `POST /api/shifts/{id}/breaks/end` - end the open break.
pub async fn end_break(
    State(state): State<AppState>,
    Path(shift_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut tx = state.db.pool().begin().await?;

    ShiftRepository::end_break_tx(&mut tx, &shift_id)
        .await
        .map_err(|_| ApiError::conflict(format!("Shift {shift_id} has no open break")))?;

    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity(
            "shift",
            &shift_id,
            "update",
            json!({ "id": shift_id, "breakEnded": true }).to_string(),
        ),
    )
    .await?;
    tx.commit().await?;

    info!(shift_id = %shift_id, "Break ended");
    Ok(Json(json!({ "success": true })))
}

/// `GET /api/shifts/{id}` - shift with its breaks.
pub async fn get_shift(
    State(state): State<AppState>,
    Path(shift_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let shift = state
        .db
        .shifts()
        .get_by_id(&shift_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Shift", &shift_id))?;

    let breaks = state.db.shifts().get_breaks(&shift_id).await?;
    Ok(Json(json!({ "shift": shift, "breaks": breaks })))
}
