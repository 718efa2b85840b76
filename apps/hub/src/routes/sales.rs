//! # Sales Routes
//!
//! The canonical mutation shape every state-changing route follows:
//!
//! 1. Validate inputs (400 on structural problems)
//! 2. Open a transaction
//! 3. Insert/update business rows
//! 4. Insert one outbox row describing the change
//! 5. Commit; only then emit any realtime broadcast
//!
//! The outbox payload is the full inbound body, forwarded verbatim - the
//! cloud endpoint is the source of schema truth and the hub avoids
//! re-serialization bugs by not rebuilding it.

use axum::extract::{Extension, Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use harbor_core::validation::{validate_non_empty, validate_positive_amount};
use harbor_core::{new_id, OutboxStatus, Payment, Refund, Sale, SaleItem, SaleStatus};
use harbor_db::{NewOutboxItem, OutboxRepository, SaleRepository};

use crate::auth::CurrentSession;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// =============================================================================
// Request Shapes
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSaleRequest {
    total: f64,
    #[serde(default)]
    subtotal: Option<f64>,
    #[serde(default)]
    discount: Option<f64>,
    #[serde(default)]
    tax: Option<f64>,
    #[serde(default)]
    order_type: Option<String>,
    #[serde(default)]
    customer_id: Option<String>,
    #[serde(default)]
    table_id: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    items: Vec<CreateSaleItem>,
    #[serde(default)]
    payments: Vec<CreateSalePayment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSaleItem {
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    quantity: f64,
    unit_price: f64,
    #[serde(default)]
    modifiers: Option<Value>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSalePayment {
    method: String,
    amount: f64,
    #[serde(default)]
    reference: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /api/sales`
pub async fn create_sale(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    // Step 1: validate. The raw body is kept for the outbox payload.
    let request: CreateSaleRequest = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::validation(format!("Invalid sale body: {e}")))?;

    validate_positive_amount("total", request.total)?;
    validate_non_empty("items", &request.items)?;
    for item in &request.items {
        validate_positive_amount("quantity", item.quantity)?;
        if !item.unit_price.is_finite() || item.unit_price < 0.0 {
            return Err(ApiError::validation("unitPrice must be non-negative"));
        }
    }
    for payment in &request.payments {
        validate_positive_amount("amount", payment.amount)?;
    }

    let sale_id = new_id();
    let receipt_number = state.db.sequences().next_receipt_number().await?;
    let now = Utc::now();

    let sale = Sale {
        id: sale_id.clone(),
        receipt_number: receipt_number.clone(),
        status: SaleStatus::Completed,
        subtotal: request.subtotal.unwrap_or(request.total),
        discount: request.discount.unwrap_or(0.0),
        tax: request.tax.unwrap_or(0.0),
        total: request.total,
        order_type: request.order_type.clone(),
        customer_id: request.customer_id.clone(),
        table_id: request.table_id.clone(),
        user_id: Some(session.user_id.clone()),
        terminal_id: session.terminal_id.clone(),
        notes: request.notes.clone(),
        sync_status: OutboxStatus::Pending,
        created_at: now,
        voided_at: None,
        void_reason: None,
    };

    // Steps 2-4: one transaction for the sale graph and its outbox row.
    let mut tx = state.db.pool().begin().await?;

    SaleRepository::insert_tx(&mut tx, &sale).await?;

    for item in &request.items {
        let sale_item = SaleItem {
            id: new_id(),
            sale_id: sale_id.clone(),
            product_id: item.product_id.clone(),
            name: item.name.clone().unwrap_or_default(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            line_total: item.quantity * item.unit_price,
            modifiers: item.modifiers.as_ref().map(Value::to_string),
            notes: item.notes.clone(),
            created_at: now,
        };
        SaleRepository::insert_item_tx(&mut tx, &sale_item).await?;
    }

    for payment in &request.payments {
        let payment_row = Payment {
            id: new_id(),
            sale_id: sale_id.clone(),
            method: payment.method.clone(),
            amount: payment.amount,
            reference: payment.reference.clone(),
            created_at: now,
        };
        SaleRepository::insert_payment_tx(&mut tx, &payment_row).await?;
    }

    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity("sale", &sale_id, "create", body.to_string()),
    )
    .await?;

    // Step 5: commit.
    tx.commit().await?;

    info!(sale_id = %sale_id, receipt_number = %receipt_number, total = request.total, "Sale created");

    Ok(Json(json!({
        "id": sale_id,
        "receiptNumber": receipt_number,
        "status": SaleStatus::Completed,
    })))
}

/// `GET /api/sales/{id}` - sale with items and payments.
pub async fn get_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let sale = state
        .db
        .sales()
        .get_by_id(&sale_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sale", &sale_id))?;

    let items = state.db.sales().get_items(&sale_id).await?;
    let payments = state.db.sales().get_payments(&sale_id).await?;

    Ok(Json(json!({
        "sale": sale,
        "items": items,
        "payments": payments,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoidSaleRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /api/sales/{id}/void`
///
/// Voiding an already-voided sale is a conflict (400), not a 404.
pub async fn void_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<String>,
    Json(body): Json<VoidSaleRequest>,
) -> ApiResult<Json<Value>> {
    let sale = state
        .db
        .sales()
        .get_by_id(&sale_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sale", &sale_id))?;

    if sale.status == SaleStatus::Voided {
        return Err(ApiError::conflict(format!(
            "Sale {sale_id} is already voided"
        )));
    }

    let mut tx = state.db.pool().begin().await?;

    SaleRepository::void_tx(&mut tx, &sale_id, body.reason.as_deref()).await?;

    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity(
            "sale",
            &sale_id,
            "void",
            json!({ "id": sale_id, "reason": body.reason }).to_string(),
        ),
    )
    .await?;

    tx.commit().await?;

    info!(sale_id = %sale_id, "Sale voided");
    Ok(Json(json!({ "id": sale_id, "status": SaleStatus::Voided })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefundRequest {
    amount: f64,
    #[serde(default)]
    reason: Option<String>,
}

/// `POST /api/sales/{id}/refund`
pub async fn refund_sale(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(sale_id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request: RefundRequest = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::validation(format!("Invalid refund body: {e}")))?;
    validate_positive_amount("amount", request.amount)?;

    let sale = state
        .db
        .sales()
        .get_by_id(&sale_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sale", &sale_id))?;

    if request.amount > sale.total {
        return Err(ApiError::conflict(format!(
            "Refund {} exceeds sale total {}",
            request.amount, sale.total
        )));
    }

    let refund = Refund {
        id: new_id(),
        sale_id: sale_id.clone(),
        amount: request.amount,
        reason: request.reason.clone(),
        user_id: Some(session.user_id.clone()),
        sync_status: OutboxStatus::Pending,
        created_at: Utc::now(),
    };

    let mut tx = state.db.pool().begin().await?;

    SaleRepository::insert_refund_tx(&mut tx, &refund).await?;

    OutboxRepository::enqueue_tx(
        &mut tx,
        &NewOutboxItem::for_entity("refund", &refund.id, "create", body.to_string()),
    )
    .await?;

    tx.commit().await?;

    info!(sale_id = %sale_id, refund_id = %refund.id, amount = request.amount, "Refund recorded");
    Ok(Json(json!({ "id": refund.id, "saleId": sale_id })))
}

/// `GET /api/sales` - recent sales.
pub async fn list_sales(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let sales = state.db.sales().list_recent(100).await?;
    Ok(Json(json!({ "sales": sales })))
}
