//! # Sale Repository
//!
//! Store operations for sales, sale items, payments, and refunds.
//!
//! Sales arrive at the hub already tendered: a single POST carries the items
//! and payments, and the whole graph commits in one transaction together
//! with its outbox row. Voids and refunds are status transitions guarded at
//! the SQL level so a double-void is detected without a read-modify-write
//! race.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use harbor_core::{Payment, Refund, Sale, SaleItem};

const SALE_COLUMNS: &str = "id, receipt_number, status, subtotal, discount, tax, total, \
     order_type, customer_id, table_id, user_id, terminal_id, notes, sync_status, \
     created_at, voided_at, void_reason";

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Transactional writes
    // -------------------------------------------------------------------------

    /// Inserts a sale row inside an open transaction.
    pub async fn insert_tx(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, receipt_number = %sale.receipt_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, receipt_number, status, subtotal, discount, tax, total,
                order_type, customer_id, table_id, user_id, terminal_id, notes,
                sync_status, created_at, voided_at, void_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.receipt_number)
        .bind(sale.status)
        .bind(sale.subtotal)
        .bind(sale.discount)
        .bind(sale.tax)
        .bind(sale.total)
        .bind(&sale.order_type)
        .bind(&sale.customer_id)
        .bind(&sale.table_id)
        .bind(&sale.user_id)
        .bind(&sale.terminal_id)
        .bind(&sale.notes)
        .bind(sale.sync_status)
        .bind(sale.created_at)
        .bind(sale.voided_at)
        .bind(&sale.void_reason)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts a line item inside an open transaction.
    pub async fn insert_item_tx(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id, name, quantity, unit_price, line_total,
                modifiers, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.line_total)
        .bind(&item.modifiers)
        .bind(&item.notes)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts a payment inside an open transaction.
    pub async fn insert_payment_tx(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, sale_id, method, amount, reference, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.sale_id)
        .bind(&payment.method)
        .bind(payment.amount)
        .bind(&payment.reference)
        .bind(payment.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Voids a COMPLETED sale inside an open transaction.
    ///
    /// The status guard lives in the UPDATE itself: zero rows affected means
    /// the sale is missing or already voided, and the caller reports the
    /// conflict.
    pub async fn void_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
        reason: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales SET
                status = 'VOIDED',
                voided_at = ?2,
                void_reason = ?3,
                sync_status = 'PENDING'
            WHERE id = ?1 AND status = 'COMPLETED'
            "#,
        )
        .bind(sale_id)
        .bind(Utc::now())
        .bind(reason)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale (completed)", sale_id));
        }

        Ok(())
    }

    /// Inserts a refund inside an open transaction.
    pub async fn insert_refund_tx(conn: &mut SqliteConnection, refund: &Refund) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refunds (id, sale_id, amount, reason, user_id, sync_status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&refund.id)
        .bind(&refund.sale_id)
        .bind(refund.amount)
        .bind(&refund.reason)
        .bind(&refund.user_id)
        .bind(refund.sync_status)
        .bind(refund.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as(
            "SELECT id, sale_id, product_id, name, quantity, unit_price, line_total, \
             modifiers, notes, created_at \
             FROM sale_items WHERE sale_id = ?1 ORDER BY created_at",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    pub async fn get_payments(&self, sale_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as(
            "SELECT id, sale_id, method, amount, reference, created_at \
             FROM payments WHERE sale_id = ?1 ORDER BY created_at",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Recent sales for the terminal-facing listing.
    pub async fn list_recent(&self, limit: i64) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as(&format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at DESC LIMIT ?1",
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use harbor_core::{OutboxStatus, SaleStatus};

    fn sample_sale(id: &str) -> Sale {
        Sale {
            id: id.into(),
            receipt_number: "20260801-0001".into(),
            status: SaleStatus::Completed,
            subtotal: 10.0,
            discount: 0.0,
            tax: 0.0,
            total: 10.0,
            order_type: None,
            customer_id: None,
            table_id: None,
            user_id: None,
            terminal_id: None,
            notes: None,
            sync_status: OutboxStatus::Pending,
            created_at: Utc::now(),
            voided_at: None,
            void_reason: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        SaleRepository::insert_tx(&mut tx, &sample_sale("s1")).await.unwrap();
        tx.commit().await.unwrap();

        let sale = db.sales().get_by_id("s1").await.unwrap().unwrap();
        assert_eq!(sale.receipt_number, "20260801-0001");
        assert_eq!(sale.status, SaleStatus::Completed);
        assert_eq!(sale.total, 10.0);
    }

    #[tokio::test]
    async fn test_void_guard_rejects_double_void() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        SaleRepository::insert_tx(&mut tx, &sample_sale("s1")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        SaleRepository::void_tx(&mut tx, "s1", Some("test")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let second = SaleRepository::void_tx(&mut tx, "s1", None).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_rollback_leaves_no_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        SaleRepository::insert_tx(&mut tx, &sample_sale("s1")).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(db.sales().get_by_id("s1").await.unwrap().is_none());
    }
}
