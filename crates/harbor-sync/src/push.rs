//! # Push Engine
//!
//! Periodic worker that drains the outbox to the cloud.
//!
//! ## Processing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Push Engine Flow                                  │
//! │                                                                         │
//! │  Every push interval (default 5s), if configured and not draining:     │
//! │                                                                         │
//! │  1. Claim up to batch_size PENDING rows (priority DESC, age ASC)       │
//! │  2. Per item: resolve entity_type -> endpoint, parse payload           │
//! │  3. POST {entityType, entityId, action, payload, correlationId}        │
//! │     to /api/hub/push/{endpoint}                                        │
//! │                                                                         │
//! │  Outcome policy:                                                       │
//! │  ┌───────────────┬─────────────────────────────────────────────────┐   │
//! │  │ 2xx           │ SYNCED                                          │   │
//! │  │ 409 Conflict  │ SYNCED, note "duplicate" (cloud already has it) │   │
//! │  │ other 4xx     │ DEAD_LETTER (non-retriable)                     │   │
//! │  │ 5xx / network │ PENDING again; DEAD_LETTER on the last attempt  │   │
//! │  └───────────────┴─────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Items are independent: one failure never aborts the batch.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! At-least-once delivery becomes exactly-once effect because the cloud
//! treats a repeated `entityId + action` as idempotent (409 maps to
//! success).

use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use harbor_core::{OutboxItem, OutboxStatus};
use harbor_db::Database;

use crate::client::CloudClient;
use crate::config::SharedConfig;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Entity Maps
// =============================================================================

/// Static entity-type -> push endpoint segment mapping. An entity type
/// outside this map dead-letters immediately.
fn endpoint_for(entity_type: &str) -> Option<&'static str> {
    match entity_type {
        "sale" => Some("sales"),
        "refund" => Some("refunds"),
        "kitchen_order" => Some("kitchen-orders"),
        "cash_drawer" => Some("cash-drawers"),
        "cash_drawer_transaction" => Some("cash-drawer-transactions"),
        "shift" => Some("shifts"),
        "guest_check" => Some("guest-checks"),
        "store_credit" => Some("store-credit"),
        "table_session" => Some("table-sessions"),
        _ => None,
    }
}

/// Tables whose `sync_status` column mirrors the outbox terminal state.
fn mirror_table_for(entity_type: &str) -> Option<&'static str> {
    match entity_type {
        "sale" => Some("sales"),
        "refund" => Some("refunds"),
        "kitchen_order" => Some("kitchen_orders"),
        "cash_drawer" => Some("cash_drawers"),
        "shift" => Some("shift_logs"),
        "guest_check" => Some("guest_checks"),
        "store_credit" => Some("store_credit_entries"),
        "table_session" => Some("table_sessions"),
        _ => None,
    }
}

// =============================================================================
// Push Engine
// =============================================================================

/// Periodic outbox drainer. Single-instance per hub; only one
/// `process_outbox` runs at a time.
pub struct PushEngine {
    db: Database,
    client: CloudClient,
    config: SharedConfig,
    draining: Arc<AtomicBool>,
    trigger_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling the push engine.
#[derive(Clone)]
pub struct PushHandle {
    trigger_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
    draining: Arc<AtomicBool>,
}

impl PushHandle {
    /// Requests an immediate drain (manual `/api/sync/push`).
    pub async fn trigger(&self) -> SyncResult<()> {
        self.trigger_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Push trigger channel closed".into()))
    }

    /// Triggers graceful shutdown; the engine finishes its current batch.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Push shutdown channel closed".into()))
    }

    /// True while a drain is in progress.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}

impl PushEngine {
    pub fn new(db: Database, client: CloudClient, config: SharedConfig) -> (Self, PushHandle) {
        let (trigger_tx, trigger_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let draining = Arc::new(AtomicBool::new(false));

        let engine = PushEngine {
            db,
            client,
            config,
            draining: draining.clone(),
            trigger_rx,
            shutdown_rx,
        };

        let handle = PushHandle {
            trigger_tx,
            shutdown_tx,
            draining,
        };

        (engine, handle)
    }

    /// Runs the push loop. Spawn as a background task.
    pub async fn run(mut self) {
        info!("Push engine starting");

        let interval_secs = self.config.read().await.push_interval_secs;
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.process_outbox().await {
                        error!(?e, "Outbox drain failed");
                    }
                }

                Some(()) = self.trigger_rx.recv() => {
                    debug!("Manual push triggered");
                    if let Err(e) = self.process_outbox().await {
                        error!(?e, "Manual outbox drain failed");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Push engine shutting down");
                    break;
                }
            }
        }

        info!("Push engine stopped");
    }

    /// Drains one batch. Guarded by an in-process flag: a tick that arrives
    /// while the previous drain is running is dropped.
    pub async fn process_outbox(&self) -> SyncResult<()> {
        if !self.client.is_configured().await {
            debug!("Cloud not configured, skipping push");
            return Ok(());
        }

        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Push already in progress, dropping tick");
            return Ok(());
        }

        let result = self.drain_batch().await;
        self.draining.store(false, Ordering::SeqCst);
        result
    }

    async fn drain_batch(&self) -> SyncResult<()> {
        let batch_size = self.config.read().await.push_batch_size;
        let items = self.db.outbox().claim_batch(batch_size).await?;

        if items.is_empty() {
            debug!("No pending outbox items");
            return Ok(());
        }

        info!(count = items.len(), "Draining outbox batch");

        for item in items {
            // Items are independent; a failure on one must not abort the rest.
            if let Err(e) = self.push_item(&item).await {
                error!(id = item.id, ?e, "Failed to record outcome for outbox item");
            }
        }

        Ok(())
    }

    /// Delivers one item and records its outcome.
    async fn push_item(&self, item: &OutboxItem) -> SyncResult<()> {
        let Some(endpoint) = endpoint_for(&item.entity_type) else {
            warn!(
                id = item.id,
                entity_type = %item.entity_type,
                "Unknown entity type, dead-lettering"
            );
            self.finish_dead_letter(item, "unknown entity type").await?;
            return Ok(());
        };

        let payload: Value = match serde_json::from_str(&item.payload) {
            Ok(value) => value,
            Err(e) => {
                warn!(id = item.id, error = %e, "Invalid outbox payload, dead-lettering");
                self.finish_dead_letter(item, "invalid payload").await?;
                return Ok(());
            }
        };

        let envelope = json!({
            "entityType": item.entity_type,
            "entityId": item.entity_id,
            "action": item.action,
            "payload": payload,
            "correlationId": item.correlation_id,
        });

        let response = self
            .client
            .post(&format!("/api/hub/push/{endpoint}"), &envelope)
            .await;

        match response.status {
            status if response.ok => {
                debug!(id = item.id, status, "Outbox item accepted");
                self.db.outbox().mark_synced(item.id, None).await?;
                self.mirror(item, OutboxStatus::Synced).await;
            }

            // The cloud already applied this entityId+action; idempotent
            // duplicate counts as delivered.
            409 => {
                debug!(id = item.id, "Cloud reported duplicate, marking synced");
                self.db.outbox().mark_synced(item.id, Some("duplicate")).await?;
                self.mirror(item, OutboxStatus::Synced).await;
            }

            status if (400..500).contains(&status) => {
                let reason = response
                    .error
                    .unwrap_or_else(|| format!("HTTP {status}"));
                warn!(id = item.id, status, "Non-retriable push failure");
                self.finish_dead_letter(item, &reason).await?;
            }

            // 5xx or network failure (status 0): retriable
            status => {
                let reason = response
                    .error
                    .unwrap_or_else(|| format!("HTTP {status}"));

                if item.attempts >= item.max_attempts {
                    warn!(
                        id = item.id,
                        attempts = item.attempts,
                        "Max attempts reached, dead-lettering"
                    );
                    self.finish_dead_letter(item, &format!("max attempts: {reason}"))
                        .await?;
                } else {
                    debug!(id = item.id, status, attempts = item.attempts, "Requeueing for retry");
                    self.db.outbox().mark_pending_again(item.id, &reason).await?;
                }
            }
        }

        Ok(())
    }

    async fn finish_dead_letter(&self, item: &OutboxItem, reason: &str) -> SyncResult<()> {
        self.db.outbox().mark_dead_letter(item.id, reason).await?;
        self.mirror(item, OutboxStatus::DeadLetter).await;
        Ok(())
    }

    /// Mirrors a terminal outcome onto the originating business row. Best
    /// effort: a missing row (or an unmapped entity type) is not a failure.
    async fn mirror(&self, item: &OutboxItem, status: OutboxStatus) {
        if let Some(table) = mirror_table_for(&item.entity_type) {
            if let Err(e) = self
                .db
                .outbox()
                .mirror_sync_status(table, &item.entity_id, status)
                .await
            {
                warn!(id = item.id, table, ?e, "Failed to mirror sync status");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use axum::routing::post;
    use axum::Router;
    use harbor_db::{DbConfig, NewOutboxItem};
    use std::sync::atomic::AtomicUsize;

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{addr}")
    }

    async fn engine_against(base_url: String) -> (PushEngine, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut config = HubConfig::default();
        config.cloud_base_url = base_url;
        config.cloud_api_key = "key".into();
        let shared = config.into_shared();
        let client = CloudClient::new(shared.clone()).unwrap();
        let (engine, _handle) = PushEngine::new(db.clone(), client, shared);
        (engine, db)
    }

    fn sale_item(entity_id: &str, max_attempts: i64) -> NewOutboxItem {
        NewOutboxItem {
            entity_type: "sale".into(),
            entity_id: entity_id.into(),
            action: "create".into(),
            payload: r#"{"total":10}"#.into(),
            correlation_id: Some(entity_id.into()),
            priority: 10,
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_2xx_marks_synced() {
        let router = Router::new().route(
            "/api/hub/push/sales",
            post(|| async { (axum::http::StatusCode::CREATED, "ok") }),
        );
        let base = spawn_stub(router).await;
        let (engine, db) = engine_against(base).await;

        let id = db.outbox().enqueue(&sale_item("s1", 5)).await.unwrap();
        engine.process_outbox().await.unwrap();

        let row = db.outbox().get(id).await.unwrap().unwrap();
        assert_eq!(row.status, OutboxStatus::Synced);
        assert!(row.processed_at.is_some());
    }

    #[tokio::test]
    async fn test_409_is_idempotent_duplicate() {
        let router = Router::new().route(
            "/api/hub/push/sales",
            post(|| async { (axum::http::StatusCode::CONFLICT, "duplicate") }),
        );
        let base = spawn_stub(router).await;
        let (engine, db) = engine_against(base).await;

        let id = db.outbox().enqueue(&sale_item("s1", 5)).await.unwrap();
        engine.process_outbox().await.unwrap();

        let row = db.outbox().get(id).await.unwrap().unwrap();
        assert_eq!(row.status, OutboxStatus::Synced);
        assert_eq!(row.error.as_deref(), Some("duplicate"));
    }

    #[tokio::test]
    async fn test_4xx_dead_letters_immediately() {
        let router = Router::new().route(
            "/api/hub/push/sales",
            post(|| async { (axum::http::StatusCode::UNPROCESSABLE_ENTITY, "bad") }),
        );
        let base = spawn_stub(router).await;
        let (engine, db) = engine_against(base).await;

        let id = db.outbox().enqueue(&sale_item("s1", 5)).await.unwrap();
        engine.process_outbox().await.unwrap();

        let row = db.outbox().get(id).await.unwrap().unwrap();
        assert_eq!(row.status, OutboxStatus::DeadLetter);
        assert_eq!(row.attempts, 1);
    }

    #[tokio::test]
    async fn test_500_retries_until_max_attempts() {
        let router = Router::new().route(
            "/api/hub/push/sales",
            post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_stub(router).await;
        let (engine, db) = engine_against(base).await;

        let id = db.outbox().enqueue(&sale_item("s1", 3)).await.unwrap();

        // Exactly max_attempts cycles: two requeues, then dead letter
        for _ in 0..3 {
            engine.process_outbox().await.unwrap();
        }

        let row = db.outbox().get(id).await.unwrap().unwrap();
        assert_eq!(row.status, OutboxStatus::DeadLetter);
        assert_eq!(row.attempts, 3);
        assert!(row.error.as_deref().unwrap_or("").starts_with("max attempts"));
    }

    #[tokio::test]
    async fn test_unknown_entity_type_dead_letters() {
        let (engine, db) = engine_against("http://127.0.0.1:1".into()).await;

        let mut item = sale_item("x1", 5);
        item.entity_type = "mystery".into();
        let id = db.outbox().enqueue(&item).await.unwrap();

        engine.process_outbox().await.unwrap();

        let row = db.outbox().get(id).await.unwrap().unwrap();
        assert_eq!(row.status, OutboxStatus::DeadLetter);
        assert_eq!(row.error.as_deref(), Some("unknown entity type"));
    }

    #[tokio::test]
    async fn test_invalid_payload_dead_letters() {
        let (engine, db) = engine_against("http://127.0.0.1:1".into()).await;

        let mut item = sale_item("x1", 5);
        item.payload = "not json".into();
        let id = db.outbox().enqueue(&item).await.unwrap();

        engine.process_outbox().await.unwrap();

        let row = db.outbox().get(id).await.unwrap().unwrap();
        assert_eq!(row.status, OutboxStatus::DeadLetter);
        assert_eq!(row.error.as_deref(), Some("invalid payload"));
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_batch() {
        static HITS: AtomicUsize = AtomicUsize::new(0);

        let router = Router::new().route(
            "/api/hub/push/sales",
            post(|| async {
                // First request fails, second succeeds
                if HITS.fetch_add(1, Ordering::SeqCst) == 0 {
                    (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom")
                } else {
                    (axum::http::StatusCode::OK, "ok")
                }
            }),
        );
        let base = spawn_stub(router).await;
        let (engine, db) = engine_against(base).await;

        // Distinct priorities pin the claim order: "a" first, "b" second
        let first = db.outbox().enqueue(&sale_item("a", 5)).await.unwrap();
        let mut low = sale_item("b", 5);
        low.priority = 0;
        let second = db.outbox().enqueue(&low).await.unwrap();

        engine.process_outbox().await.unwrap();

        let first_row = db.outbox().get(first).await.unwrap().unwrap();
        let second_row = db.outbox().get(second).await.unwrap().unwrap();
        assert_eq!(first_row.status, OutboxStatus::Pending);
        assert_eq!(second_row.status, OutboxStatus::Synced);
    }

    #[tokio::test]
    async fn test_unconfigured_hub_skips_silently() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let shared = HubConfig::default().into_shared();
        let client = CloudClient::new(shared.clone()).unwrap();
        let (engine, _handle) = PushEngine::new(db.clone(), client, shared);

        let id = db.outbox().enqueue(&sale_item("s1", 5)).await.unwrap();
        engine.process_outbox().await.unwrap();

        // Nothing claimed, nothing attempted
        let row = db.outbox().get(id).await.unwrap().unwrap();
        assert_eq!(row.status, OutboxStatus::Pending);
        assert_eq!(row.attempts, 0);
    }
}
