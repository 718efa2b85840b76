//! # Outbox Repository
//!
//! Queue semantics on top of the store for writes the hub owes to the cloud.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  MUTATING REQUEST (e.g. POST /api/sales)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │  1. INSERT INTO sales / sale_items / payments ...              │   │
//! │  │  2. INSERT INTO outbox_queue (entity_type, entity_id, action,  │   │
//! │  │     payload, priority) VALUES ('sale', ?, 'create', ?, 10)    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← No business fact without a push record, no orphan record     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Push engine claims PENDING rows (priority DESC, created_at ASC),      │
//! │  POSTs them to the cloud, and records the terminal outcome.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Claim and status update are one transaction so two workers can never pick
//! up the same row.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use harbor_core::{OutboxItem, OutboxStats, OutboxStatus, DEFAULT_MAX_ATTEMPTS};

/// Columns selected for [`OutboxItem`] rows.
const OUTBOX_COLUMNS: &str = "id, entity_type, entity_id, action, payload, correlation_id, \
     priority, status, attempts, max_attempts, error, created_at, processed_at";

/// Insert shape for a new outbox row.
#[derive(Debug, Clone)]
pub struct NewOutboxItem {
    pub entity_type: String,
    pub entity_id: String,
    /// "create", "update", "void", ...
    pub action: String,
    /// JSON forwarded verbatim to the cloud.
    pub payload: String,
    pub correlation_id: Option<String>,
    pub priority: i64,
    pub max_attempts: i64,
}

impl NewOutboxItem {
    /// Builds an item with the conventional priority for its entity type and
    /// the entity id as correlation id.
    pub fn for_entity(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        action: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        let entity_type = entity_type.into();
        let entity_id = entity_id.into();
        let priority = harbor_core::priority_for(&entity_type);
        NewOutboxItem {
            entity_type,
            correlation_id: Some(entity_id.clone()),
            entity_id,
            action: action.into(),
            payload: payload.into(),
            priority,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Repository for outbox operations.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Enqueue
    // -------------------------------------------------------------------------

    /// Inserts an outbox row inside an open transaction.
    ///
    /// This is the only enqueue path mutation handlers may use: the business
    /// write and the outbox row must commit or roll back together.
    pub async fn enqueue_tx(conn: &mut SqliteConnection, item: &NewOutboxItem) -> DbResult<i64> {
        let now = Utc::now();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO outbox_queue (
                entity_type, entity_id, action, payload, correlation_id,
                priority, status, attempts, max_attempts, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'PENDING', 0, ?7, ?8)
            RETURNING id
            "#,
        )
        .bind(&item.entity_type)
        .bind(&item.entity_id)
        .bind(&item.action)
        .bind(&item.payload)
        .bind(&item.correlation_id)
        .bind(item.priority)
        .bind(item.max_attempts)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        debug!(
            id,
            entity_type = %item.entity_type,
            entity_id = %item.entity_id,
            action = %item.action,
            "Outbox row enqueued"
        );

        Ok(id)
    }

    /// Enqueues a standalone row in its own transaction (tests, admin tools).
    pub async fn enqueue(&self, item: &NewOutboxItem) -> DbResult<i64> {
        let mut tx = self.pool.begin().await?;
        let id = Self::enqueue_tx(&mut tx, item).await?;
        tx.commit().await?;
        Ok(id)
    }

    // -------------------------------------------------------------------------
    // Claiming
    // -------------------------------------------------------------------------

    /// Claims up to `limit` pending items for delivery.
    ///
    /// Selects `status = PENDING AND attempts < max_attempts` ordered by
    /// `(priority DESC, created_at ASC)`, then flips each to PROCESSING and
    /// increments its attempt counter - all in one transaction, so a second
    /// concurrent claim can never double-pick a row.
    pub async fn claim_batch(&self, limit: i64) -> DbResult<Vec<OutboxItem>> {
        let mut tx = self.pool.begin().await?;

        let mut items: Vec<OutboxItem> = sqlx::query_as(&format!(
            r#"
            SELECT {OUTBOX_COLUMNS}
            FROM outbox_queue
            WHERE status = 'PENDING' AND attempts < max_attempts
            ORDER BY priority DESC, created_at ASC
            LIMIT ?1
            "#,
        ))
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                "UPDATE outbox_queue SET status = 'PROCESSING', attempts = attempts + 1 WHERE id = ?1",
            )
            .bind(item.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        // Reflect the transition in the returned snapshot.
        for item in &mut items {
            item.status = OutboxStatus::Processing;
            item.attempts += 1;
        }

        Ok(items)
    }

    // -------------------------------------------------------------------------
    // Outcomes
    // -------------------------------------------------------------------------

    /// Marks an item delivered. An optional note (e.g. "duplicate" for a 409)
    /// is kept in the message column.
    pub async fn mark_synced(&self, id: i64, note: Option<&str>) -> DbResult<()> {
        sqlx::query(
            "UPDATE outbox_queue SET status = 'SYNCED', error = ?2, processed_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(note)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gives up on an item: non-retriable failure or attempts exhausted.
    pub async fn mark_dead_letter(&self, id: i64, error: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE outbox_queue SET status = 'DEAD_LETTER', error = ?2, processed_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns an item to the queue after a retriable failure. The attempt
    /// counter stays where the claim left it.
    pub async fn mark_pending_again(&self, id: i64, error: &str) -> DbResult<()> {
        sqlx::query("UPDATE outbox_queue SET status = 'PENDING', error = ?2 WHERE id = ?1")
            .bind(id)
            .bind(error)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Resets matching dead letters to PENDING with a fresh attempt budget.
    /// Returns the number of rows revived.
    pub async fn retry_dead_letters(&self, entity_type: Option<&str>) -> DbResult<u64> {
        let result = match entity_type {
            Some(entity_type) => {
                sqlx::query(
                    "UPDATE outbox_queue SET status = 'PENDING', attempts = 0, error = NULL \
                     WHERE status = 'DEAD_LETTER' AND entity_type = ?1",
                )
                .bind(entity_type)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE outbox_queue SET status = 'PENDING', attempts = 0, error = NULL \
                     WHERE status = 'DEAD_LETTER'",
                )
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected())
    }

    // -------------------------------------------------------------------------
    // Observability
    // -------------------------------------------------------------------------

    /// Gets one item by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<OutboxItem>> {
        let item = sqlx::query_as(&format!(
            "SELECT {OUTBOX_COLUMNS} FROM outbox_queue WHERE id = ?1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Outbox depth grouped by status.
    pub async fn stats(&self) -> DbResult<OutboxStats> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM outbox_queue GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut stats = OutboxStats::default();
        for (status, count) in rows {
            match status.as_str() {
                "PENDING" => stats.pending = count,
                "PROCESSING" => stats.processing = count,
                "SYNCED" => stats.synced = count,
                "DEAD_LETTER" => stats.dead_letter = count,
                _ => {}
            }
        }

        Ok(stats)
    }

    /// Age in seconds of the oldest PENDING row, if any.
    pub async fn oldest_pending_age_secs(&self) -> DbResult<Option<i64>> {
        let oldest: Option<chrono::DateTime<Utc>> = sqlx::query_scalar(
            "SELECT MIN(created_at) FROM outbox_queue WHERE status = 'PENDING'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(oldest.map(|at| (Utc::now() - at).num_seconds()))
    }

    /// Mirrors an outbox terminal state onto the originating business row's
    /// `sync_status` column. `table` comes from the push engine's static
    /// entity map, never from input.
    pub async fn mirror_sync_status(
        &self,
        table: &'static str,
        entity_id: &str,
        status: OutboxStatus,
    ) -> DbResult<()> {
        sqlx::query(&format!(
            "UPDATE {table} SET sync_status = ?1 WHERE id = ?2",
        ))
        .bind(status.as_str())
        .bind(entity_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
