//! # Pull Engine
//!
//! Periodic worker that replicates reference entities from the cloud in
//! dependency order.
//!
//! ## Cycle Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Pull Cycle (default 60s)                         │
//! │                                                                         │
//! │  1. Single-flight guard: a cycle already running drops the tick        │
//! │  2. Gate on cloud credentials                                          │
//! │  3. For each entity in PULL_PLAN order:                                │
//! │     a. Read sync_state; send lastSyncedAt as sinceVersion              │
//! │     b. GET /api/hub/sync/{entity}                                      │
//! │        - 404: endpoint not deployed yet, record zero, move on          │
//! │        - other non-2xx: record the error, move on (fault isolation)    │
//! │     c. Transform (renames + camelCase->snake_case + coercion)          │
//! │     d. Apply: upsert batch / full replace, companions, deletedIds      │
//! │     e. sync_state: lastSyncedAt = cycle start, recordCount, SUCCESS    │
//! │  4. Log the cycle total                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cursor for most entities is the previous cycle's timestamp; the cloud
//! filters `updatedAt > since`. Cursorless entities full-fetch and rely on
//! upserts being cheap on re-reads.

pub mod plan;
pub mod transform;

use chrono::Utc;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use harbor_db::{Database, ReferenceRepository, ReferenceRow};

use crate::client::CloudClient;
use crate::config::SharedConfig;
use crate::error::{SyncError, SyncResult};
use plan::{EntityPull, PullMode, ORDER_TYPE_PRICE_COLUMNS, PIZZA_CONFIG_COLUMNS, PULL_PLAN};
use transform::{extract_cursor, extract_deleted_ids, extract_items, transform_item};

// =============================================================================
// Pull Engine
// =============================================================================

/// Periodic reference replicator. Single-instance per hub.
pub struct PullEngine {
    db: Database,
    client: CloudClient,
    config: SharedConfig,
    running: Arc<AtomicBool>,
    trigger_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling the pull engine.
#[derive(Clone)]
pub struct PullHandle {
    trigger_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
    running: Arc<AtomicBool>,
}

impl PullHandle {
    /// Requests an immediate cycle (manual `/api/sync/pull`).
    pub async fn trigger(&self) -> SyncResult<()> {
        self.trigger_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Pull trigger channel closed".into()))
    }

    /// Triggers graceful shutdown; the engine finishes its current cycle.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Pull shutdown channel closed".into()))
    }

    /// True while a cycle is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl PullEngine {
    pub fn new(db: Database, client: CloudClient, config: SharedConfig) -> (Self, PullHandle) {
        let (trigger_tx, trigger_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let running = Arc::new(AtomicBool::new(false));

        let engine = PullEngine {
            db,
            client,
            config,
            running: running.clone(),
            trigger_rx,
            shutdown_rx,
        };

        let handle = PullHandle {
            trigger_tx,
            shutdown_tx,
            running,
        };

        (engine, handle)
    }

    /// Runs the pull loop. Spawn as a background task.
    pub async fn run(mut self) {
        info!("Pull engine starting");

        let interval_secs = self.config.read().await.pull_interval_secs;
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!(?e, "Pull cycle failed");
                    }
                }

                Some(()) = self.trigger_rx.recv() => {
                    debug!("Manual pull triggered");
                    if let Err(e) = self.run_cycle().await {
                        error!(?e, "Manual pull cycle failed");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Pull engine shutting down");
                    break;
                }
            }
        }

        info!("Pull engine stopped");
    }

    /// Runs one cycle over the whole plan. Single-flight: a tick that
    /// arrives while a cycle is running is dropped.
    pub async fn run_cycle(&self) -> SyncResult<()> {
        if !self.client.is_configured().await {
            debug!("Cloud not configured, skipping pull cycle");
            return Ok(());
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Pull cycle already running, dropping tick");
            return Ok(());
        }

        let result = self.pull_all().await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn pull_all(&self) -> SyncResult<()> {
        let mut total = 0usize;

        // The plan is fault-isolated: one entity failing is recorded in its
        // sync_state row and the cycle moves on.
        for entry in PULL_PLAN {
            match self.pull_entity(entry).await {
                Ok(count) => total += count,
                Err(e) => {
                    warn!(entity = entry.entity, error = %e, "Entity pull failed");
                    if let Err(e) = self.db.sync_state().mark_error(entry.entity, &e.to_string()).await
                    {
                        error!(entity = entry.entity, ?e, "Failed to record pull error");
                    }
                }
            }
        }

        info!(total, "Pull cycle complete");
        Ok(())
    }

    /// Pulls one entity and applies it to the store.
    async fn pull_entity(&self, entry: &EntityPull) -> SyncResult<usize> {
        let state = self.db.sync_state().get(entry.entity).await?;
        let started_at = Utc::now();

        let mut query: Vec<(&str, String)> = Vec::new();
        if entry.uses_cursor {
            if let Some(since) = state.as_ref().and_then(|s| s.last_synced_at) {
                query.push(("sinceVersion", since.to_rfc3339()));
            }
        }

        self.db.sync_state().mark_syncing(entry.entity).await?;

        let response = self
            .client
            .get(&format!("/api/hub/sync/{}", entry.endpoint), &query)
            .await;

        // 404 means the endpoint isn't deployed yet: zero pulled, not an
        // error, and the cursor stays put.
        if response.status == 404 {
            debug!(entity = entry.entity, "Sync endpoint unavailable yet");
            self.db.sync_state().mark_skipped(entry.entity).await?;
            return Ok(0);
        }

        if !response.ok {
            return Err(SyncError::Http(
                response
                    .error
                    .unwrap_or_else(|| format!("HTTP {}", response.status)),
            ));
        }

        let data = response.data.unwrap_or(Value::Null);
        let raw_items = extract_items(&data);
        let deleted_ids = extract_deleted_ids(&data);
        let cursor = extract_cursor(&data);

        let mut rows: Vec<ReferenceRow> = Vec::with_capacity(raw_items.len());
        for item in &raw_items {
            match transform_item(item, entry.renames) {
                Some(row) => rows.push(row),
                None => warn!(entity = entry.entity, "Skipping non-object item"),
            }
        }

        let applied = match entry.mode {
            PullMode::Replace => {
                let outcome = self
                    .db
                    .reference()
                    .replace_all(entry.table, entry.columns, &rows)
                    .await?;
                outcome.applied
            }
            PullMode::Upsert => {
                self.apply_upserts(entry, &raw_items, &rows, &deleted_ids)
                    .await?
            }
        };

        self.db
            .sync_state()
            .mark_success(entry.entity, started_at, applied as i64, cursor.as_deref())
            .await?;

        debug!(entity = entry.entity, applied, "Entity pull complete");
        Ok(applied)
    }

    /// Applies one upsert batch - rows, embedded companions, and deletions -
    /// in a single transaction.
    async fn apply_upserts(
        &self,
        entry: &EntityPull,
        raw_items: &[Value],
        rows: &[ReferenceRow],
        deleted_ids: &[String],
    ) -> SyncResult<usize> {
        let mut tx = self.db.pool().begin().await?;

        let outcome =
            ReferenceRepository::upsert_rows_tx(&mut tx, entry.table, entry.columns, rows).await?;

        if entry.entity == "products" {
            Self::apply_product_companions(&mut tx, raw_items).await?;
        }

        if !deleted_ids.is_empty() {
            let deleted = ReferenceRepository::delete_ids_tx(
                &mut tx,
                entry.table,
                entry.deleted_children,
                deleted_ids,
            )
            .await?;
            debug!(entity = entry.entity, deleted, "Applied cloud deletions");
        }

        tx.commit().await?;
        Ok(outcome.applied)
    }

    /// Products embed two companion payloads: an `orderTypePrices` array and
    /// an optional `pizzaProductConfig` object. Both are extracted and
    /// upserted alongside the product rows.
    async fn apply_product_companions(
        tx: &mut sqlx::SqliteConnection,
        raw_items: &[Value],
    ) -> SyncResult<()> {
        let mut price_rows: Vec<ReferenceRow> = Vec::new();
        let mut config_rows: Vec<ReferenceRow> = Vec::new();

        for item in raw_items {
            let Some(product_id) = item.get("id").and_then(Value::as_str) else {
                continue;
            };

            if let Some(prices) = item.get("orderTypePrices").and_then(Value::as_array) {
                for price in prices {
                    let Some(mut row) = transform_item(price, &[]) else {
                        continue;
                    };
                    row.insert("product_id".into(), Value::from(product_id));
                    if !row.contains_key("id") {
                        // Deterministic fallback key: one price row per
                        // (product, order type)
                        let order_type = row
                            .get("order_type")
                            .and_then(Value::as_str)
                            .unwrap_or("default");
                        row.insert("id".into(), Value::from(format!("{product_id}:{order_type}")));
                    }
                    price_rows.push(row);
                }
            }

            if let Some(config) = item.get("pizzaProductConfig").filter(|v| v.is_object()) {
                if let Some(mut row) = transform_item(config, &[]) {
                    row.insert("product_id".into(), Value::from(product_id));
                    if !row.contains_key("id") {
                        row.insert("id".into(), Value::from(product_id));
                    }
                    config_rows.push(row);
                }
            }
        }

        if !price_rows.is_empty() {
            ReferenceRepository::upsert_rows_tx(
                tx,
                "product_order_type_prices",
                ORDER_TYPE_PRICE_COLUMNS,
                &price_rows,
            )
            .await?;
        }

        if !config_rows.is_empty() {
            ReferenceRepository::upsert_rows_tx(
                tx,
                "product_pizza_configs",
                PIZZA_CONFIG_COLUMNS,
                &config_rows,
            )
            .await?;
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use axum::extract::{Query, State};
    use axum::routing::get;
    use axum::{Json, Router};
    use harbor_core::SyncRunStatus;
    use harbor_db::DbConfig;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Stub cloud: serves canned JSON per entity endpoint, records received
    /// sinceVersion values, 404s everything else.
    #[derive(Clone, Default)]
    struct StubCloud {
        responses: Arc<Mutex<HashMap<String, Value>>>,
        since_params: Arc<Mutex<HashMap<String, Vec<Option<String>>>>>,
        fail_entities: Arc<Mutex<Vec<String>>>,
    }

    impl StubCloud {
        fn set(&self, entity: &str, value: Value) {
            self.responses.lock().unwrap().insert(entity.into(), value);
        }

        fn fail(&self, entity: &str) {
            self.fail_entities.lock().unwrap().push(entity.into());
        }

        fn since_for(&self, entity: &str) -> Vec<Option<String>> {
            self.since_params
                .lock()
                .unwrap()
                .get(entity)
                .cloned()
                .unwrap_or_default()
        }
    }

    async fn handler(
        State(stub): State<StubCloud>,
        axum::extract::Path(entity): axum::extract::Path<String>,
        Query(params): Query<HashMap<String, String>>,
    ) -> axum::response::Response {
        use axum::response::IntoResponse;

        stub.since_params
            .lock()
            .unwrap()
            .entry(entity.clone())
            .or_default()
            .push(params.get("sinceVersion").cloned());

        if stub.fail_entities.lock().unwrap().contains(&entity) {
            return (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
        }

        match stub.responses.lock().unwrap().get(&entity) {
            Some(value) => Json(value.clone()).into_response(),
            None => axum::http::StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn spawn_cloud(stub: StubCloud) -> String {
        let router = Router::new()
            .route("/api/hub/sync/{entity}", get(handler))
            .with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{addr}")
    }

    async fn engine_against(base_url: String) -> (PullEngine, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut config = HubConfig::default();
        config.cloud_base_url = base_url;
        config.cloud_api_key = "key".into();
        let shared = config.into_shared();
        let client = CloudClient::new(shared.clone()).unwrap();
        let (engine, _handle) = PullEngine::new(db.clone(), client, shared);
        (engine, db)
    }

    fn category(id: &str, name: &str) -> Value {
        json!({"id": id, "name": name, "sortOrder": 1, "isActive": true})
    }

    fn product(id: &str, category_id: &str, name: &str) -> Value {
        json!({
            "id": id, "categoryId": category_id, "name": name,
            "price": 9.99, "isActive": true
        })
    }

    #[tokio::test]
    async fn test_cold_start_replicates_with_referential_integrity() {
        let stub = StubCloud::default();
        stub.set(
            "categories",
            json!({"items": [category("c1", "Drinks"), category("c2", "Food"), category("c3", "Sides")]}),
        );
        stub.set(
            "products",
            json!({"items": [
                product("p1", "c1", "Cola"), product("p2", "c1", "Water"),
                product("p3", "c2", "Burger"), product("p4", "c2", "Pizza"),
                product("p5", "c3", "Fries")
            ]}),
        );
        let base = spawn_cloud(stub).await;
        let (engine, db) = engine_against(base).await;

        engine.run_cycle().await.unwrap();

        let categories = db.sync_state().get("categories").await.unwrap().unwrap();
        let products = db.sync_state().get("products").await.unwrap().unwrap();
        assert_eq!(categories.record_count, 3);
        assert_eq!(products.record_count, 5);
        assert_eq!(categories.status, SyncRunStatus::Success);

        // Every product's category_id resolves (FKs are on, so the inserts
        // proving this already survived dependency order)
        let dangling: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products p LEFT JOIN categories c ON p.category_id = c.id \
             WHERE c.id IS NULL",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(dangling, 0);
    }

    #[tokio::test]
    async fn test_delta_pull_sends_since_version() {
        let stub = StubCloud::default();
        stub.set("categories", json!({"items": [category("c1", "Drinks")]}));
        let base = spawn_cloud(stub.clone()).await;
        let (engine, db) = engine_against(base).await;

        engine.run_cycle().await.unwrap();

        // Cloud updates one category; second cycle should carry a cursor
        stub.set("categories", json!({"items": [category("c1", "Beverages")]}));
        engine.run_cycle().await.unwrap();

        let since = stub.since_for("categories");
        assert_eq!(since.len(), 2);
        assert!(since[0].is_none(), "cold start has no cursor");
        assert!(since[1].is_some(), "second cycle sends sinceVersion");

        let name: String = sqlx::query_scalar("SELECT name FROM categories WHERE id = 'c1'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(name, "Beverages");
    }

    #[tokio::test]
    async fn test_back_to_back_cycles_are_idempotent() {
        let stub = StubCloud::default();
        stub.set(
            "categories",
            json!({"items": [category("c1", "Drinks"), category("c2", "Food")]}),
        );
        let base = spawn_cloud(stub).await;
        let (engine, db) = engine_against(base).await;

        engine.run_cycle().await.unwrap();
        let first: Vec<(String, String)> =
            sqlx::query_as("SELECT id, name FROM categories ORDER BY id")
                .fetch_all(db.pool())
                .await
                .unwrap();

        engine.run_cycle().await.unwrap();
        let second: Vec<(String, String)> =
            sqlx::query_as("SELECT id, name FROM categories ORDER BY id")
                .fetch_all(db.pool())
                .await
                .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_one_failing_entity_does_not_stop_the_plan() {
        let stub = StubCloud::default();
        stub.set("categories", json!({"items": [category("c1", "Drinks")]}));
        stub.set("floors", json!({"items": [{"id": "f1", "name": "Main"}]}));
        stub.fail("users");
        let base = spawn_cloud(stub).await;
        let (engine, db) = engine_against(base).await;

        engine.run_cycle().await.unwrap();

        let users = db.sync_state().get("users").await.unwrap().unwrap();
        assert_eq!(users.status, SyncRunStatus::Error);
        assert!(users.error.is_some());

        // Later entities in the plan still completed
        let categories = db.sync_state().get("categories").await.unwrap().unwrap();
        let floors = db.sync_state().get("floors").await.unwrap().unwrap();
        assert_eq!(categories.status, SyncRunStatus::Success);
        assert_eq!(floors.status, SyncRunStatus::Success);
    }

    #[tokio::test]
    async fn test_404_records_zero_and_keeps_cursor() {
        let stub = StubCloud::default();
        stub.set("categories", json!({"items": [category("c1", "Drinks")]}));
        let base = spawn_cloud(stub.clone()).await;
        let (engine, db) = engine_against(base).await;

        engine.run_cycle().await.unwrap();
        let cursor_before = db
            .sync_state()
            .get("categories")
            .await
            .unwrap()
            .unwrap()
            .last_synced_at;

        // Endpoint disappears (e.g. cloud rollback); 404 is not an error
        stub.responses.lock().unwrap().remove("categories");
        engine.run_cycle().await.unwrap();

        let state = db.sync_state().get("categories").await.unwrap().unwrap();
        assert_eq!(state.status, SyncRunStatus::Success);
        assert_eq!(state.record_count, 0);
        assert_eq!(state.last_synced_at, cursor_before);
    }

    #[tokio::test]
    async fn test_product_companions_are_extracted() {
        let stub = StubCloud::default();
        stub.set(
            "products",
            json!({"items": [{
                "id": "p1", "name": "Margherita", "price": 12.0, "isActive": true,
                "orderTypePrices": [
                    {"orderType": "DELIVERY", "price": 14.0},
                    {"orderType": "DINE_IN", "price": 12.0}
                ],
                "pizzaProductConfig": {"maxToppings": 7, "includedCount": 2}
            }]}),
        );
        let base = spawn_cloud(stub).await;
        let (engine, db) = engine_against(base).await;

        engine.run_cycle().await.unwrap();

        let prices: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product_order_type_prices WHERE product_id = 'p1'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(prices, 2);

        let max_toppings: i64 = sqlx::query_scalar(
            "SELECT max_toppings FROM product_pizza_configs WHERE product_id = 'p1'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(max_toppings, 7);
    }

    #[tokio::test]
    async fn test_deleted_ids_cascade_to_children() {
        let stub = StubCloud::default();
        stub.set("deals", json!({"items": [{"id": "d1", "name": "Lunch", "isActive": true}]}));
        stub.set(
            "deal-items",
            json!({"items": [{"id": "di1", "dealId": "d1", "productId": "p1", "quantity": 1}]}),
        );
        let base = spawn_cloud(stub.clone()).await;
        let (engine, db) = engine_against(base).await;

        engine.run_cycle().await.unwrap();
        assert_eq!(db.reference().count("deal_items").await.unwrap(), 1);

        // Cloud deletes the deal
        stub.set("deals", json!({"items": [], "deletedIds": ["d1"]}));
        engine.run_cycle().await.unwrap();

        assert_eq!(db.reference().count("deals").await.unwrap(), 0);
        assert_eq!(db.reference().count("deal_items").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bad_row_is_skipped_not_fatal() {
        let stub = StubCloud::default();
        stub.set(
            "categories",
            json!({"items": [category("c1", "Drinks"), {"name": "no id here"}]}),
        );
        let base = spawn_cloud(stub).await;
        let (engine, db) = engine_against(base).await;

        engine.run_cycle().await.unwrap();

        let state = db.sync_state().get("categories").await.unwrap().unwrap();
        assert_eq!(state.status, SyncRunStatus::Success);
        assert_eq!(state.record_count, 1);
    }
}
