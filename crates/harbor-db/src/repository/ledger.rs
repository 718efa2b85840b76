//! # Ledger Repository
//!
//! Store operations for the smaller hub-owned records: guest checks, the
//! store-credit ledger, and table sessions. All follow the same shape as
//! sales: insert or guarded transition inside the caller's transaction.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DbError, DbResult};
use harbor_core::{GuestCheck, StoreCreditEntry, TableSession};

#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Guest checks
    // -------------------------------------------------------------------------

    pub async fn insert_check_tx(conn: &mut SqliteConnection, check: &GuestCheck) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO guest_checks (id, name, table_id, status, items, total, sync_status, created_at, closed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&check.id)
        .bind(&check.name)
        .bind(&check.table_id)
        .bind(check.status)
        .bind(&check.items)
        .bind(check.total)
        .bind(check.sync_status)
        .bind(check.created_at)
        .bind(check.closed_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn close_check_tx(conn: &mut SqliteConnection, check_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE guest_checks SET status = 'CLOSED', closed_at = ?2, sync_status = 'PENDING'
            WHERE id = ?1 AND status = 'OPEN'
            "#,
        )
        .bind(check_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Guest check (open)", check_id));
        }

        Ok(())
    }

    pub async fn get_check(&self, id: &str) -> DbResult<Option<GuestCheck>> {
        let check = sqlx::query_as(
            "SELECT id, name, table_id, status, items, total, sync_status, created_at, closed_at \
             FROM guest_checks WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(check)
    }

    // -------------------------------------------------------------------------
    // Store credit
    // -------------------------------------------------------------------------

    pub async fn insert_credit_tx(
        conn: &mut SqliteConnection,
        entry: &StoreCreditEntry,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO store_credit_entries (id, customer_id, delta, reason, reference_id, sync_status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.customer_id)
        .bind(entry.delta)
        .bind(&entry.reason)
        .bind(&entry.reference_id)
        .bind(entry.sync_status)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Current balance for a customer: sum of ledger deltas.
    pub async fn credit_balance(&self, customer_id: &str) -> DbResult<f64> {
        let balance: Option<f64> = sqlx::query_scalar(
            "SELECT SUM(delta) FROM store_credit_entries WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(balance.unwrap_or(0.0))
    }

    // -------------------------------------------------------------------------
    // Table sessions
    // -------------------------------------------------------------------------

    pub async fn insert_table_session_tx(
        conn: &mut SqliteConnection,
        session: &TableSession,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO table_sessions (id, table_id, status, guest_count, sync_status, opened_at, closed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&session.id)
        .bind(&session.table_id)
        .bind(session.status)
        .bind(session.guest_count)
        .bind(session.sync_status)
        .bind(session.opened_at)
        .bind(session.closed_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn close_table_session_tx(
        conn: &mut SqliteConnection,
        session_id: &str,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE table_sessions SET status = 'CLOSED', closed_at = ?2, sync_status = 'PENDING'
            WHERE id = ?1 AND status = 'OPEN'
            "#,
        )
        .bind(session_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Table session (open)", session_id));
        }

        Ok(())
    }

    pub async fn get_table_session(&self, id: &str) -> DbResult<Option<TableSession>> {
        let session = sqlx::query_as(
            "SELECT id, table_id, status, guest_count, sync_status, opened_at, closed_at \
             FROM table_sessions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use harbor_core::{CheckStatus, OutboxStatus};

    #[tokio::test]
    async fn test_credit_balance_sums_deltas() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        for (id, delta) in [("c1", 25.0), ("c2", -10.0)] {
            LedgerRepository::insert_credit_tx(
                &mut tx,
                &StoreCreditEntry {
                    id: id.into(),
                    customer_id: "cust-1".into(),
                    delta,
                    reason: None,
                    reference_id: None,
                    sync_status: OutboxStatus::Pending,
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();

        let balance = db.ledger().credit_balance("cust-1").await.unwrap();
        assert!((balance - 15.0).abs() < f64::EPSILON);
        assert_eq!(db.ledger().credit_balance("nobody").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_table_session_close_guard() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        LedgerRepository::insert_table_session_tx(
            &mut tx,
            &TableSession {
                id: "ts1".into(),
                table_id: "tab-1".into(),
                status: CheckStatus::Open,
                guest_count: Some(4),
                sync_status: OutboxStatus::Pending,
                opened_at: Utc::now(),
                closed_at: None,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        LedgerRepository::close_table_session_tx(&mut tx, "ts1").await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        assert!(LedgerRepository::close_table_session_tx(&mut tx, "ts1").await.is_err());
    }
}
