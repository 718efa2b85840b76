//! # Sync State Repository
//!
//! One row per replicated entity type: cursor, record count, and the outcome
//! of the most recent pull. Created lazily on first pull, mutated only by the
//! pull engine, and deleted only by an explicit administrative reset.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::DbResult;
use harbor_core::{SyncRunStatus, SyncState};

const SYNC_STATE_COLUMNS: &str =
    "entity_type, last_synced_at, cursor, record_count, status, error, updated_at";

#[derive(Debug, Clone)]
pub struct SyncStateRepository {
    pool: SqlitePool,
}

impl SyncStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SyncStateRepository { pool }
    }

    /// Reads the state row for an entity type, if one exists yet.
    pub async fn get(&self, entity_type: &str) -> DbResult<Option<SyncState>> {
        let state = sqlx::query_as(&format!(
            "SELECT {SYNC_STATE_COLUMNS} FROM sync_state WHERE entity_type = ?1",
        ))
        .bind(entity_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(state)
    }

    /// Lists every state row, for `/api/sync/status`.
    pub async fn list(&self) -> DbResult<Vec<SyncState>> {
        let states = sqlx::query_as(&format!(
            "SELECT {SYNC_STATE_COLUMNS} FROM sync_state ORDER BY entity_type",
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(states)
    }

    /// Marks an entity as mid-pull.
    pub async fn mark_syncing(&self, entity_type: &str) -> DbResult<()> {
        self.upsert_status(entity_type, SyncRunStatus::Syncing, None)
            .await
    }

    /// Records a successful pull: cursor advances to `synced_at`.
    pub async fn mark_success(
        &self,
        entity_type: &str,
        synced_at: DateTime<Utc>,
        record_count: i64,
        cursor: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_state (entity_type, last_synced_at, cursor, record_count, status, error, updated_at)
            VALUES (?1, ?2, ?3, ?4, 'SUCCESS', NULL, ?5)
            ON CONFLICT(entity_type) DO UPDATE SET
                last_synced_at = excluded.last_synced_at,
                cursor = excluded.cursor,
                record_count = excluded.record_count,
                status = excluded.status,
                error = NULL,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(entity_type)
        .bind(synced_at)
        .bind(cursor)
        .bind(record_count)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a failed pull. The cursor stays put so the next cycle retries
    /// the same delta window.
    pub async fn mark_error(&self, entity_type: &str, error: &str) -> DbResult<()> {
        self.upsert_status(entity_type, SyncRunStatus::Error, Some(error))
            .await
    }

    /// Records a pull that found no endpoint (HTTP 404): zero pulled,
    /// status SUCCESS, and the cursor left untouched so nothing is missed
    /// once the endpoint appears.
    pub async fn mark_skipped(&self, entity_type: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_state (entity_type, record_count, status, updated_at)
            VALUES (?1, 0, 'SUCCESS', ?2)
            ON CONFLICT(entity_type) DO UPDATE SET
                record_count = 0,
                status = 'SUCCESS',
                error = NULL,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(entity_type)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_status(
        &self,
        entity_type: &str,
        status: SyncRunStatus,
        error: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_state (entity_type, record_count, status, error, updated_at)
            VALUES (?1, 0, ?2, ?3, ?4)
            ON CONFLICT(entity_type) DO UPDATE SET
                status = excluded.status,
                error = excluded.error,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(entity_type)
        .bind(status)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Administrative reset: drops every cursor so the next cycle full-fetches.
    pub async fn reset(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM sync_state")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Tests
// =============================================================================
