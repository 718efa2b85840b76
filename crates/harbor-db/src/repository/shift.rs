//! # Shift Repository
//!
//! Store operations for staff shifts and their breaks.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DbError, DbResult};
use harbor_core::{ShiftBreak, ShiftLog};

const SHIFT_COLUMNS: &str =
    "id, user_id, terminal_id, status, sync_status, started_at, ended_at";

#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

impl ShiftRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShiftRepository { pool }
    }

    pub async fn insert_tx(conn: &mut SqliteConnection, shift: &ShiftLog) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO shift_logs (id, user_id, terminal_id, status, sync_status, started_at, ended_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&shift.id)
        .bind(&shift.user_id)
        .bind(&shift.terminal_id)
        .bind(shift.status)
        .bind(shift.sync_status)
        .bind(shift.started_at)
        .bind(shift.ended_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Ends an OPEN shift; zero rows affected means it's missing or already
    /// ended.
    pub async fn end_tx(conn: &mut SqliteConnection, shift_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE shift_logs SET status = 'CLOSED', ended_at = ?2, sync_status = 'PENDING'
            WHERE id = ?1 AND status = 'OPEN'
            "#,
        )
        .bind(shift_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Shift (open)", shift_id));
        }

        Ok(())
    }

    pub async fn insert_break_tx(conn: &mut SqliteConnection, brk: &ShiftBreak) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO shift_breaks (id, shift_id, started_at, ended_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&brk.id)
        .bind(&brk.shift_id)
        .bind(brk.started_at)
        .bind(brk.ended_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Closes the most recent open break on a shift.
    pub async fn end_break_tx(conn: &mut SqliteConnection, shift_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE shift_breaks SET ended_at = ?2
            WHERE id = (
                SELECT id FROM shift_breaks
                WHERE shift_id = ?1 AND ended_at IS NULL
                ORDER BY started_at DESC LIMIT 1
            )
            "#,
        )
        .bind(shift_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Open break for shift", shift_id));
        }

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ShiftLog>> {
        let shift = sqlx::query_as(&format!(
            "SELECT {SHIFT_COLUMNS} FROM shift_logs WHERE id = ?1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(shift)
    }

    pub async fn get_breaks(&self, shift_id: &str) -> DbResult<Vec<ShiftBreak>> {
        let breaks = sqlx::query_as(
            "SELECT id, shift_id, started_at, ended_at \
             FROM shift_breaks WHERE shift_id = ?1 ORDER BY started_at",
        )
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(breaks)
    }
}
