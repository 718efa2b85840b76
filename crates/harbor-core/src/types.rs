//! # Domain Types
//!
//! Core domain types used throughout Harbor Hub.
//!
//! ## Ownership Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Entity Ownership                               │
//! │                                                                         │
//! │  REFERENCE (cloud-owned)          TRANSACTIONAL (hub-owned)             │
//! │  ───────────────────────          ─────────────────────────             │
//! │  users, categories, taxes,        sales + items + payments,             │
//! │  products (+ companions),         kitchen orders + items,               │
//! │  modifiers, customers, deals,     cash drawers + transactions,          │
//! │  pizza config + pricing,          shifts + breaks, refunds,             │
//! │  floors, tables                   guest checks, store credit,           │
//! │                                   table sessions                        │
//! │                                                                         │
//! │  Pulled by the pull engine;       Created locally; reach the cloud      │
//! │  the hub only reads them.         only through the outbox.              │
//! │                                                                         │
//! │  SYNC PLUMBING: sync_state (one row per replicated entity type),        │
//! │  outbox_queue (durable pending writes), order_sequences (receipts).     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transactional entities carry a `sync_status` column mirroring the terminal
//! state of their outbox row, so a terminal can see at a glance whether a
//! sale has reached the cloud.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Outbox
// =============================================================================

/// Delivery state of an outbox item.
///
/// Transitions are monotonic except `Processing → Pending` on a retriable
/// failure. `Synced` and `DeadLetter` are terminal; only the administrative
/// retry-dead-letters operation may leave `DeadLetter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxStatus {
    /// Eligible for pickup by the push engine.
    Pending,
    /// Claimed by a push batch; attempts already incremented.
    Processing,
    /// Accepted by the cloud (or acknowledged as a duplicate).
    Synced,
    /// Given up: non-retriable failure or attempts exhausted.
    DeadLetter,
}

impl OutboxStatus {
    /// Storage representation, matching the `sqlx` column encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "PENDING",
            OutboxStatus::Processing => "PROCESSING",
            OutboxStatus::Synced => "SYNCED",
            OutboxStatus::DeadLetter => "DEAD_LETTER",
        }
    }
}

/// A durable pending write the hub owes to the cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct OutboxItem {
    /// Monotonic row id, assigned at insert.
    pub id: i64,
    /// What kind of business fact this is: "sale", "kitchen_order", ...
    pub entity_type: String,
    /// Id of the originating business row.
    pub entity_id: String,
    /// What happened to it: "create", "update", "void", ...
    pub action: String,
    /// Opaque JSON blob the cloud consumes; forwarded verbatim.
    pub payload: String,
    pub correlation_id: Option<String>,
    /// Higher drains first.
    pub priority: i64,
    pub status: OutboxStatus,
    pub attempts: i64,
    pub max_attempts: i64,
    /// Last failure message, if any.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Outbox depth grouped by status, for observability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxStats {
    pub pending: i64,
    pub processing: i64,
    pub synced: i64,
    pub dead_letter: i64,
}

// =============================================================================
// Sync State
// =============================================================================

/// Outcome of the most recent pull for one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncRunStatus {
    Idle,
    Syncing,
    Success,
    Error,
}

/// Per-entity replication cursor and bookkeeping.
///
/// Created lazily on first pull; mutated only by the pull engine; removed
/// only by an explicit administrative reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub entity_type: String,
    /// Wall time of the last successful pull; doubles as the `sinceVersion`
    /// cursor for delta requests.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Opaque cursor the cloud returned, when it returns one.
    pub cursor: Option<String>,
    pub record_count: i64,
    pub status: SyncRunStatus,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Sessions & Terminals
// =============================================================================

/// An authenticated terminal session minted by a successful PIN login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub terminal_id: Option<String>,
    pub user_id: String,
    pub is_active: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Terminal classification, resolved server-side from the terminal record.
/// Used to filter realtime broadcasts (kitchen events only reach kitchen
/// displays).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum TerminalRole {
    Pos,
    Kds,
    Admin,
}

impl Default for TerminalRole {
    fn default() -> Self {
        TerminalRole::Pos
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalStatus {
    Online,
    Offline,
}

/// A POS terminal known to this hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Terminal {
    pub id: String,
    pub name: Option<String>,
    pub role: TerminalRole,
    pub status: TerminalStatus,
    pub last_seen_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Reference Entities (cloud-owned, read-only mirrors)
// =============================================================================

/// A staff member replicated from the cloud. The PIN hash rides along so the
/// hub can authenticate terminals during cloud outages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub tenant_id: Option<String>,
    pub name: String,
    pub role: Option<String>,
    /// Argon2 PIN hash; users without one cannot log in at the hub.
    pub pin_hash: Option<String>,
    /// JSON array of permission strings.
    pub permissions: Option<String>,
    pub max_discount: Option<f64>,
    pub is_active: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub tenant_id: Option<String>,
    pub name: String,
    pub sort_order: Option<i64>,
    pub is_active: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub tenant_id: Option<String>,
    pub category_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub tax_id: Option<String>,
    pub is_active: bool,
    pub sort_order: Option<i64>,
    pub image_url: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Sales
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    Completed,
    Voided,
}

/// A completed sale. Sales are born COMPLETED at the hub; drafts live on the
/// terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub receipt_number: String,
    pub status: SaleStatus,
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub total: f64,
    pub order_type: Option<String>,
    pub customer_id: Option<String>,
    pub table_id: Option<String>,
    pub user_id: Option<String>,
    pub terminal_id: Option<String>,
    pub notes: Option<String>,
    /// Mirrors the outbox terminal state for observability.
    pub sync_status: OutboxStatus,
    pub created_at: DateTime<Utc>,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: Option<String>,
    /// Name at time of sale (frozen; product edits don't rewrite history).
    pub name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub line_total: f64,
    /// JSON array of applied modifiers.
    pub modifiers: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    /// "CASH", "CARD", ... — opaque to the hub, meaningful to the cloud.
    pub method: String,
    pub amount: f64,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub id: String,
    pub sale_id: String,
    pub amount: f64,
    pub reason: Option<String>,
    pub user_id: Option<String>,
    pub sync_status: OutboxStatus,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Kitchen Orders
// =============================================================================

/// Kitchen order lifecycle. Bumps advance strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KitchenOrderStatus {
    Pending,
    Preparing,
    Ready,
    Completed,
}

impl KitchenOrderStatus {
    /// The status a bump advances to, or `None` from the terminal state.
    pub fn next(&self) -> Option<KitchenOrderStatus> {
        match self {
            KitchenOrderStatus::Pending => Some(KitchenOrderStatus::Preparing),
            KitchenOrderStatus::Preparing => Some(KitchenOrderStatus::Ready),
            KitchenOrderStatus::Ready => Some(KitchenOrderStatus::Completed),
            KitchenOrderStatus::Completed => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct KitchenOrder {
    pub id: String,
    pub sale_id: Option<String>,
    pub order_number: Option<String>,
    pub status: KitchenOrderStatus,
    pub table_id: Option<String>,
    pub order_type: Option<String>,
    pub notes: Option<String>,
    pub sync_status: OutboxStatus,
    pub created_at: DateTime<Utc>,
    /// Set on the PENDING → PREPARING transition.
    pub fired_at: Option<DateTime<Utc>>,
    /// Set on the READY → COMPLETED transition.
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct KitchenOrderItem {
    pub id: String,
    pub kitchen_order_id: String,
    pub product_id: Option<String>,
    pub name: String,
    pub quantity: f64,
    pub modifiers: Option<String>,
    pub notes: Option<String>,
    pub station: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Cash Drawers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrawerStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct CashDrawer {
    pub id: String,
    pub terminal_id: Option<String>,
    pub user_id: Option<String>,
    pub opening_amount: f64,
    pub closing_amount: Option<f64>,
    pub expected_amount: Option<f64>,
    pub status: DrawerStatus,
    pub sync_status: OutboxStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct DrawerTransaction {
    pub id: String,
    pub drawer_id: String,
    /// "PAID_IN", "PAID_OUT", "DROP", ...
    pub kind: String,
    pub amount: f64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Shifts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ShiftLog {
    pub id: String,
    pub user_id: String,
    pub terminal_id: Option<String>,
    pub status: ShiftStatus,
    pub sync_status: OutboxStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ShiftBreak {
    pub id: String,
    pub shift_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Guest Checks, Store Credit, Table Sessions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Open,
    Closed,
}

/// An open tab not yet converted to a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct GuestCheck {
    pub id: String,
    pub name: Option<String>,
    pub table_id: Option<String>,
    pub status: CheckStatus,
    /// JSON array of line items; the check is a scratchpad, not a ledger.
    pub items: Option<String>,
    pub total: f64,
    pub sync_status: OutboxStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Append-only store-credit ledger entry. Positive delta grants credit,
/// negative redeems it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct StoreCreditEntry {
    pub id: String,
    pub customer_id: String,
    pub delta: f64,
    pub reason: Option<String>,
    pub reference_id: Option<String>,
    pub sync_status: OutboxStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct TableSession {
    pub id: String,
    pub table_id: String,
    pub status: CheckStatus,
    pub guest_count: Option<i64>,
    pub sync_status: OutboxStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kitchen_status_progression() {
        assert_eq!(
            KitchenOrderStatus::Pending.next(),
            Some(KitchenOrderStatus::Preparing)
        );
        assert_eq!(
            KitchenOrderStatus::Preparing.next(),
            Some(KitchenOrderStatus::Ready)
        );
        assert_eq!(
            KitchenOrderStatus::Ready.next(),
            Some(KitchenOrderStatus::Completed)
        );
        assert_eq!(KitchenOrderStatus::Completed.next(), None);
    }

    #[test]
    fn test_outbox_status_storage_form() {
        assert_eq!(OutboxStatus::Pending.as_str(), "PENDING");
        assert_eq!(OutboxStatus::DeadLetter.as_str(), "DEAD_LETTER");
    }

    #[test]
    fn test_status_serde_round_trip() {
        let json = serde_json::to_string(&OutboxStatus::DeadLetter).unwrap();
        assert_eq!(json, "\"DEAD_LETTER\"");
        let back: OutboxStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OutboxStatus::DeadLetter);
    }
}
