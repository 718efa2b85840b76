//! # Cash Drawer Repository
//!
//! Store operations for cash drawers and their paid-in/paid-out entries.
//! Open/close are status transitions guarded in SQL, like sale voids.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DbError, DbResult};
use harbor_core::{CashDrawer, DrawerTransaction};

const DRAWER_COLUMNS: &str = "id, terminal_id, user_id, opening_amount, closing_amount, \
     expected_amount, status, sync_status, opened_at, closed_at";

#[derive(Debug, Clone)]
pub struct DrawerRepository {
    pool: SqlitePool,
}

impl DrawerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DrawerRepository { pool }
    }

    pub async fn insert_tx(conn: &mut SqliteConnection, drawer: &CashDrawer) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cash_drawers (
                id, terminal_id, user_id, opening_amount, closing_amount,
                expected_amount, status, sync_status, opened_at, closed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&drawer.id)
        .bind(&drawer.terminal_id)
        .bind(&drawer.user_id)
        .bind(drawer.opening_amount)
        .bind(drawer.closing_amount)
        .bind(drawer.expected_amount)
        .bind(drawer.status)
        .bind(drawer.sync_status)
        .bind(drawer.opened_at)
        .bind(drawer.closed_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Closes an OPEN drawer. Zero rows affected means the drawer is missing
    /// or not open - the caller reports the conflict.
    pub async fn close_tx(
        conn: &mut SqliteConnection,
        drawer_id: &str,
        closing_amount: f64,
        expected_amount: Option<f64>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE cash_drawers SET
                status = 'CLOSED',
                closing_amount = ?2,
                expected_amount = COALESCE(?3, expected_amount),
                closed_at = ?4,
                sync_status = 'PENDING'
            WHERE id = ?1 AND status = 'OPEN'
            "#,
        )
        .bind(drawer_id)
        .bind(closing_amount)
        .bind(expected_amount)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cash drawer (open)", drawer_id));
        }

        Ok(())
    }

    pub async fn insert_transaction_tx(
        conn: &mut SqliteConnection,
        entry: &DrawerTransaction,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cash_drawer_transactions (id, drawer_id, kind, amount, reason, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.drawer_id)
        .bind(&entry.kind)
        .bind(entry.amount)
        .bind(&entry.reason)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CashDrawer>> {
        let drawer = sqlx::query_as(&format!(
            "SELECT {DRAWER_COLUMNS} FROM cash_drawers WHERE id = ?1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(drawer)
    }

    /// The open drawer for a terminal, if any. One open drawer per terminal
    /// is an operational rule, not a constraint; first match wins.
    pub async fn open_for_terminal(&self, terminal_id: &str) -> DbResult<Option<CashDrawer>> {
        let drawer = sqlx::query_as(&format!(
            "SELECT {DRAWER_COLUMNS} FROM cash_drawers \
             WHERE terminal_id = ?1 AND status = 'OPEN' ORDER BY opened_at DESC LIMIT 1",
        ))
        .bind(terminal_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(drawer)
    }

    pub async fn get_transactions(&self, drawer_id: &str) -> DbResult<Vec<DrawerTransaction>> {
        let entries = sqlx::query_as(
            "SELECT id, drawer_id, kind, amount, reason, created_at \
             FROM cash_drawer_transactions WHERE drawer_id = ?1 ORDER BY created_at",
        )
        .bind(drawer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use harbor_core::{DrawerStatus, OutboxStatus};

    fn sample_drawer(id: &str) -> CashDrawer {
        CashDrawer {
            id: id.into(),
            terminal_id: Some("t1".into()),
            user_id: Some("u1".into()),
            opening_amount: 100.0,
            closing_amount: None,
            expected_amount: None,
            status: DrawerStatus::Open,
            sync_status: OutboxStatus::Pending,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    #[tokio::test]
    async fn test_close_guard_rejects_non_open() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        DrawerRepository::insert_tx(&mut tx, &sample_drawer("d1")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        DrawerRepository::close_tx(&mut tx, "d1", 95.0, Some(100.0)).await.unwrap();
        tx.commit().await.unwrap();

        let drawer = db.drawers().get_by_id("d1").await.unwrap().unwrap();
        assert_eq!(drawer.status, DrawerStatus::Closed);
        assert_eq!(drawer.closing_amount, Some(95.0));

        // Second close is a conflict
        let mut tx = db.pool().begin().await.unwrap();
        assert!(DrawerRepository::close_tx(&mut tx, "d1", 95.0, None).await.is_err());
    }

    #[tokio::test]
    async fn test_open_for_terminal() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        DrawerRepository::insert_tx(&mut tx, &sample_drawer("d1")).await.unwrap();
        tx.commit().await.unwrap();

        assert!(db.drawers().open_for_terminal("t1").await.unwrap().is_some());
        assert!(db.drawers().open_for_terminal("t2").await.unwrap().is_none());
    }
}
