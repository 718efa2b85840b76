//! # Kitchen Order Routes
//!
//! Kitchen tickets and the bump lifecycle. Realtime events:
//! `order:created` goes only to kitchen displays, `order:status` to
//! everyone, `order:updated` to kitchen displays - always after commit.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use harbor_core::validation::{validate_non_empty, validate_positive_amount};
use harbor_core::{new_id, KitchenOrder, KitchenOrderItem, KitchenOrderStatus, OutboxStatus, TerminalRole};
use harbor_db::{NewOutboxItem, OutboxRepository};
use harbor_db::repository::kitchen::KitchenRepository;

use crate::error::{ApiError, ApiResult};
use crate::realtime::BroadcastFilter;
use crate::state::AppState;

// =============================================================================
// Request Shapes
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateKitchenOrderRequest {
    #[serde(default)]
    sale_id: Option<String>,
    #[serde(default)]
    order_number: Option<String>,
    #[serde(default)]
    table_id: Option<String>,
    #[serde(default)]
    order_type: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    items: Vec<CreateKitchenItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateKitchenItem {
    #[serde(default)]
    product_id: Option<String>,
    name: String,
    #[serde(default = "default_quantity")]
    quantity: f64,
    #[serde(default)]
    modifiers: Option<Value>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    station: Option<String>,
}

fn default_quantity() -> f64 {
    1.0
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /api/kitchen-orders`
pub async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request: CreateKitchenOrderRequest = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::validation(format!("Invalid kitchen order body: {e}")))?;

    validate_non_empty("items", &request.items)?;
    for item in &request.items {
        validate_positive_amount("quantity", item.quantity)?;
    }

    let order_id = new_id();
    let now = Utc::now();

    let order = KitchenOrder {
        id: order_id.clone(),
        sale_id: request.sale_id.clone(),
        order_number: request.order_number.clone(),
        status: KitchenOrderStatus::Pending,
        table_id: request.table_id.clone(),
        order_type: request.order_type.clone(),
        notes: request.notes.clone(),
        sync_status: OutboxStatus::Pending,
        created_at: now,
        fired_at: None,
        completed_at: None,
    };

    let mut tx = state.db.pool().begin().await?;

    KitchenRepository::insert_tx(&mut tx, &order).await?;

    let mut items = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let row = KitchenOrderItem {
            id: new_id(),
            kitchen_order_id: order_id.clone(),
            product_id: item.product_id.clone(),
            name: item.name.clone(),
            quantity: item.quantity,
            modifiers: item.modifiers.as_ref().map(Value::to_string),
            notes: item.notes.clone(),
            station: item.station.clone(),
            created_at: now,
        };
        KitchenRepository::insert_item_tx(&mut tx, &row).await?;
        items.push(row);
    }

    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity("kitchen_order", &order_id, "create", body.to_string()),
    )
    .await?;

    tx.commit().await?;

    // New tickets are kitchen-display business only.
    state
        .bus
        .broadcast(
            "order:created",
            json!({ "order": order, "items": items }),
            Some(BroadcastFilter::Role(TerminalRole::Kds)),
        )
        .await;

    info!(order_id = %order_id, items = request.items.len(), "Kitchen order created");
    Ok(Json(json!({ "id": order_id, "status": KitchenOrderStatus::Pending })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersParams {
    pub status: Option<KitchenOrderStatus>,
}

/// `GET /api/kitchen-orders`
pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<ListOrdersParams>,
) -> ApiResult<Json<Value>> {
    let orders = state.db.kitchen().list(params.status).await?;
    Ok(Json(json!({ "orders": orders })))
}

/// `POST /api/kitchen-orders/{id}/bump`
///
/// Advances PENDING -> PREPARING -> READY -> COMPLETED. A bump past the
/// terminal state answers `{success: false}` rather than an error - the KDS
/// treats it as a no-op.
pub async fn bump_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let order = state
        .db
        .kitchen()
        .get_by_id(&order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Kitchen order", &order_id))?;

    let Some(next) = order.status.next() else {
        return Ok(Json(json!({ "success": false })));
    };

    let now = Utc::now();
    let mut tx = state.db.pool().begin().await?;

    KitchenRepository::transition_tx(&mut tx, &order_id, order.status, next, now).await?;

    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity(
            "kitchen_order",
            &order_id,
            "update",
            json!({ "id": order_id, "status": next }).to_string(),
        ),
    )
    .await?;

    tx.commit().await?;

    state
        .bus
        .broadcast("order:status", json!({ "id": order_id, "status": next }), None)
        .await;

    info!(order_id = %order_id, from = ?order.status, to = ?next, "Kitchen order bumped");
    Ok(Json(json!({ "success": true, "id": order_id, "status": next })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateOrderRequest {
    #[serde(default)]
    table_id: Option<String>,
    #[serde(default)]
    order_type: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

/// `PUT /api/kitchen-orders/{id}`
pub async fn update_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request: UpdateOrderRequest = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::validation(format!("Invalid kitchen order body: {e}")))?;

    let mut tx = state.db.pool().begin().await?;

    KitchenRepository::update_tx(
        &mut tx,
        &order_id,
        request.table_id.as_deref(),
        request.order_type.as_deref(),
        request.notes.as_deref(),
    )
    .await?;

    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity("kitchen_order", &order_id, "update", body.to_string()),
    )
    .await?;

    tx.commit().await?;

    let order = state.db.kitchen().get_by_id(&order_id).await?;
    state
        .bus
        .broadcast(
            "order:updated",
            json!({ "order": order }),
            Some(BroadcastFilter::Role(TerminalRole::Kds)),
        )
        .await;

    info!(order_id = %order_id, "Kitchen order updated");
    Ok(Json(json!({ "success": true, "id": order_id })))
}
