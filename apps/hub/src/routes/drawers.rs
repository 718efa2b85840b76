//! # Cash Drawer Routes
//!
//! Opening a drawer, paid-in/paid-out entries, and the guarded close.
//! Closing a non-open drawer is a conflict with a descriptive message.

use axum::extract::{Extension, Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use harbor_core::validation::validate_required;
use harbor_core::{new_id, CashDrawer, DrawerStatus, DrawerTransaction, OutboxStatus};
use harbor_db::repository::drawer::DrawerRepository;
use harbor_db::{NewOutboxItem, OutboxRepository};

use crate::auth::CurrentSession;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenDrawerRequest {
    opening_amount: f64,
    #[serde(default)]
    terminal_id: Option<String>,
}

/// `POST /api/drawers/open`
pub async fn open_drawer(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request: OpenDrawerRequest = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::validation(format!("Invalid drawer body: {e}")))?;

    if !request.opening_amount.is_finite() || request.opening_amount < 0.0 {
        return Err(ApiError::validation("openingAmount must be non-negative"));
    }

    let terminal_id = request.terminal_id.or_else(|| session.terminal_id.clone());

    // One open drawer per terminal is the operational rule
    if let Some(terminal_id) = &terminal_id {
        if state.db.drawers().open_for_terminal(terminal_id).await?.is_some() {
            return Err(ApiError::conflict(format!(
                "Terminal {terminal_id} already has an open drawer"
            )));
        }
    }

    let drawer = CashDrawer {
        id: new_id(),
        terminal_id,
        user_id: Some(session.user_id.clone()),
        opening_amount: request.opening_amount,
        closing_amount: None,
        expected_amount: None,
        status: DrawerStatus::Open,
        sync_status: OutboxStatus::Pending,
        opened_at: Utc::now(),
        closed_at: None,
    };

    let mut tx = state.db.pool().begin().await?;
    DrawerRepository::insert_tx(&mut tx, &drawer).await?;
    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity("cash_drawer", &drawer.id, "create", body.to_string()),
    )
    .await?;
    tx.commit().await?;

    state
        .bus
        .broadcast("drawer:opened", json!({ "drawer": drawer }), None)
        .await;

    info!(drawer_id = %drawer.id, "Cash drawer opened");
    Ok(Json(json!({ "id": drawer.id, "status": DrawerStatus::Open })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloseDrawerRequest {
    closing_amount: f64,
    #[serde(default)]
    expected_amount: Option<f64>,
}

/// `POST /api/drawers/{id}/close`
pub async fn close_drawer(
    State(state): State<AppState>,
    Path(drawer_id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request: CloseDrawerRequest = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::validation(format!("Invalid drawer body: {e}")))?;

    let drawer = state
        .db
        .drawers()
        .get_by_id(&drawer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Cash drawer", &drawer_id))?;

    if drawer.status != DrawerStatus::Open {
        return Err(ApiError::conflict(format!(
            "Cash drawer {drawer_id} is not open"
        )));
    }

    let mut tx = state.db.pool().begin().await?;
    DrawerRepository::close_tx(&mut tx, &drawer_id, request.closing_amount, request.expected_amount)
        .await?;
    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity("cash_drawer", &drawer_id, "update", body.to_string()),
    )
    .await?;
    tx.commit().await?;

    info!(drawer_id = %drawer_id, "Cash drawer closed");
    Ok(Json(json!({ "id": drawer_id, "status": DrawerStatus::Closed })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DrawerTransactionRequest {
    kind: String,
    amount: f64,
    #[serde(default)]
    reason: Option<String>,
}

/// `POST /api/drawers/{id}/transactions` - paid-in, paid-out, drops.
pub async fn add_transaction(
    State(state): State<AppState>,
    Path(drawer_id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request: DrawerTransactionRequest = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::validation(format!("Invalid transaction body: {e}")))?;

    validate_required("kind", &request.kind)?;
    if !request.amount.is_finite() || request.amount == 0.0 {
        return Err(ApiError::validation("amount must be non-zero"));
    }

    let drawer = state
        .db
        .drawers()
        .get_by_id(&drawer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Cash drawer", &drawer_id))?;

    if drawer.status != DrawerStatus::Open {
        return Err(ApiError::conflict(format!(
            "Cash drawer {drawer_id} is not open"
        )));
    }

    let entry = DrawerTransaction {
        id: new_id(),
        drawer_id: drawer_id.clone(),
        kind: request.kind,
        amount: request.amount,
        reason: request.reason,
        created_at: Utc::now(),
    };

    let mut tx = state.db.pool().begin().await?;
    DrawerRepository::insert_transaction_tx(&mut tx, &entry).await?;
    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity("cash_drawer_transaction", &entry.id, "create", body.to_string()),
    )
    .await?;
    tx.commit().await?;

    info!(drawer_id = %drawer_id, entry_id = %entry.id, "Drawer transaction recorded");
    Ok(Json(json!({ "id": entry.id })))
}

/// `GET /api/drawers/{id}` - drawer with its transactions.
pub async fn get_drawer(
    State(state): State<AppState>,
    Path(drawer_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let drawer = state
        .db
        .drawers()
        .get_by_id(&drawer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Cash drawer", &drawer_id))?;

    let transactions = state.db.drawers().get_transactions(&drawer_id).await?;
    Ok(Json(json!({ "drawer": drawer, "transactions": transactions })))
}
