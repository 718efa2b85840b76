//! # Guest Check & Store Credit Routes
//!
//! Small hub-owned ledgers following the standard mutation shape.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use harbor_core::validation::validate_required;
use harbor_core::{new_id, CheckStatus, GuestCheck, OutboxStatus, StoreCreditEntry};
use harbor_db::repository::ledger::LedgerRepository;
use harbor_db::{NewOutboxItem, OutboxRepository};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// =============================================================================
// Guest Checks
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCheckRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    table_id: Option<String>,
    #[serde(default)]
    items: Option<Value>,
    #[serde(default)]
    total: Option<f64>,
}

/// `POST /api/guest-checks`
pub async fn create_check(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request: CreateCheckRequest = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::validation(format!("Invalid guest check body: {e}")))?;

    let check = GuestCheck {
        id: new_id(),
        name: request.name,
        table_id: request.table_id,
        status: CheckStatus::Open,
        items: request.items.as_ref().map(Value::to_string),
        total: request.total.unwrap_or(0.0),
        sync_status: OutboxStatus::Pending,
        created_at: Utc::now(),
        closed_at: None,
    };

    let mut tx = state.db.pool().begin().await?;
    LedgerRepository::insert_check_tx(&mut tx, &check).await?;
    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity("guest_check", &check.id, "create", body.to_string()),
    )
    .await?;
    tx.commit().await?;

    info!(check_id = %check.id, "Guest check created");
    Ok(Json(json!({ "id": check.id, "status": CheckStatus::Open })))
}

/// `POST /api/guest-checks/{id}/close`
pub async fn close_check(
    State(state): State<AppState>,
    Path(check_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let check = state
        .db
        .ledger()
        .get_check(&check_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Guest check", &check_id))?;

    if check.status != CheckStatus::Open {
        return Err(ApiError::conflict(format!(
            "Guest check {check_id} is not open"
        )));
    }

    let mut tx = state.db.pool().begin().await?;
    LedgerRepository::close_check_tx(&mut tx, &check_id).await?;
    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity(
            "guest_check",
            &check_id,
            "update",
            json!({ "id": check_id, "status": CheckStatus::Closed }).to_string(),
        ),
    )
    .await?;
    tx.commit().await?;

    info!(check_id = %check_id, "Guest check closed");
    Ok(Json(json!({ "id": check_id, "status": CheckStatus::Closed })))
}

// =============================================================================
// Store Credit
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreCreditRequest {
    customer_id: String,
    delta: f64,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    reference_id: Option<String>,
}

/// `POST /api/store-credit` - append a ledger entry (positive grants,
/// negative redeems).
pub async fn add_credit(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request: StoreCreditRequest = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::validation(format!("Invalid store credit body: {e}")))?;

    validate_required("customerId", &request.customer_id)?;
    if !request.delta.is_finite() || request.delta == 0.0 {
        return Err(ApiError::validation("delta must be non-zero"));
    }

    // Redemptions cannot push the balance negative
    if request.delta < 0.0 {
        let balance = state.db.ledger().credit_balance(&request.customer_id).await?;
        if balance + request.delta < 0.0 {
            return Err(ApiError::conflict(format!(
                "Insufficient store credit: balance {balance}"
            )));
        }
    }

    let entry = StoreCreditEntry {
        id: new_id(),
        customer_id: request.customer_id.clone(),
        delta: request.delta,
        reason: request.reason,
        reference_id: request.reference_id,
        sync_status: OutboxStatus::Pending,
        created_at: Utc::now(),
    };

    let mut tx = state.db.pool().begin().await?;
    LedgerRepository::insert_credit_tx(&mut tx, &entry).await?;
    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity("store_credit", &entry.id, "create", body.to_string()),
    )
    .await?;
    tx.commit().await?;

    let balance = state.db.ledger().credit_balance(&request.customer_id).await?;

    info!(customer_id = %request.customer_id, delta = request.delta, "Store credit entry added");
    Ok(Json(json!({ "id": entry.id, "balance": balance })))
}

/// `GET /api/store-credit/{customerId}` - current balance.
pub async fn get_balance(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let balance = state.db.ledger().credit_balance(&customer_id).await?;
    Ok(Json(json!({ "customerId": customer_id, "balance": balance })))
}
