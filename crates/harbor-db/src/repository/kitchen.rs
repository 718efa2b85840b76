//! # Kitchen Order Repository
//!
//! Store operations for kitchen orders and their line items.
//!
//! ## Bump Lifecycle
//! ```text
//! PENDING ──bump──► PREPARING ──bump──► READY ──bump──► COMPLETED
//!                   (fired_at set)                      (completed_at set)
//! ```
//! The transition is guarded in the UPDATE so two racing bumps cannot both
//! advance the same order past a state.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DbError, DbResult};
use harbor_core::{KitchenOrder, KitchenOrderItem, KitchenOrderStatus};

const ORDER_COLUMNS: &str = "id, sale_id, order_number, status, table_id, order_type, notes, \
     sync_status, created_at, fired_at, completed_at";

#[derive(Debug, Clone)]
pub struct KitchenRepository {
    pool: SqlitePool,
}

impl KitchenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        KitchenRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Transactional writes
    // -------------------------------------------------------------------------

    pub async fn insert_tx(conn: &mut SqliteConnection, order: &KitchenOrder) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kitchen_orders (
                id, sale_id, order_number, status, table_id, order_type, notes,
                sync_status, created_at, fired_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&order.id)
        .bind(&order.sale_id)
        .bind(&order.order_number)
        .bind(order.status)
        .bind(&order.table_id)
        .bind(&order.order_type)
        .bind(&order.notes)
        .bind(order.sync_status)
        .bind(order.created_at)
        .bind(order.fired_at)
        .bind(order.completed_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn insert_item_tx(
        conn: &mut SqliteConnection,
        item: &KitchenOrderItem,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kitchen_order_items (
                id, kitchen_order_id, product_id, name, quantity, modifiers,
                notes, station, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.kitchen_order_id)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(&item.modifiers)
        .bind(&item.notes)
        .bind(&item.station)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Advances an order from `from` to `to` inside an open transaction.
    ///
    /// `fired_at` is stamped on the PENDING → PREPARING transition and
    /// `completed_at` on READY → COMPLETED. Zero rows affected means a
    /// concurrent bump got there first.
    pub async fn transition_tx(
        conn: &mut SqliteConnection,
        order_id: &str,
        from: KitchenOrderStatus,
        to: KitchenOrderStatus,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let fired_at = (to == KitchenOrderStatus::Preparing).then_some(at);
        let completed_at = (to == KitchenOrderStatus::Completed).then_some(at);

        let result = sqlx::query(
            r#"
            UPDATE kitchen_orders SET
                status = ?3,
                fired_at = COALESCE(?4, fired_at),
                completed_at = COALESCE(?5, completed_at),
                sync_status = 'PENDING'
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(order_id)
        .bind(from)
        .bind(to)
        .bind(fired_at)
        .bind(completed_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Kitchen order (in expected state)", order_id));
        }

        Ok(())
    }

    /// Updates the editable fields of an order inside an open transaction.
    pub async fn update_tx(
        conn: &mut SqliteConnection,
        order_id: &str,
        table_id: Option<&str>,
        order_type: Option<&str>,
        notes: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE kitchen_orders SET
                table_id = COALESCE(?2, table_id),
                order_type = COALESCE(?3, order_type),
                notes = COALESCE(?4, notes),
                sync_status = 'PENDING'
            WHERE id = ?1
            "#,
        )
        .bind(order_id)
        .bind(table_id)
        .bind(order_type)
        .bind(notes)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Kitchen order", order_id));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<KitchenOrder>> {
        let order = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM kitchen_orders WHERE id = ?1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Lists orders, optionally filtered by status, newest last so the KDS
    /// renders them in arrival order.
    pub async fn list(&self, status: Option<KitchenOrderStatus>) -> DbResult<Vec<KitchenOrder>> {
        let orders = match status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "SELECT {ORDER_COLUMNS} FROM kitchen_orders WHERE status = ?1 ORDER BY created_at",
                ))
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {ORDER_COLUMNS} FROM kitchen_orders ORDER BY created_at",
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(orders)
    }

    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<KitchenOrderItem>> {
        let items = sqlx::query_as(
            "SELECT id, kitchen_order_id, product_id, name, quantity, modifiers, \
             notes, station, created_at \
             FROM kitchen_order_items WHERE kitchen_order_id = ?1 ORDER BY created_at",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use harbor_core::OutboxStatus;

    fn sample_order(id: &str) -> KitchenOrder {
        KitchenOrder {
            id: id.into(),
            sale_id: None,
            order_number: Some("42".into()),
            status: KitchenOrderStatus::Pending,
            table_id: None,
            order_type: Some("DINE_IN".into()),
            notes: None,
            sync_status: OutboxStatus::Pending,
            created_at: Utc::now(),
            fired_at: None,
            completed_at: None,
        }
    }

    async fn insert(db: &Database, order: &KitchenOrder) {
        let mut tx = db.pool().begin().await.unwrap();
        KitchenRepository::insert_tx(&mut tx, order).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_full_bump_lifecycle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert(&db, &sample_order("k1")).await;

        let transitions = [
            (KitchenOrderStatus::Pending, KitchenOrderStatus::Preparing),
            (KitchenOrderStatus::Preparing, KitchenOrderStatus::Ready),
            (KitchenOrderStatus::Ready, KitchenOrderStatus::Completed),
        ];

        for (from, to) in transitions {
            let mut tx = db.pool().begin().await.unwrap();
            KitchenRepository::transition_tx(&mut tx, "k1", from, to, Utc::now())
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        let order = db.kitchen().get_by_id("k1").await.unwrap().unwrap();
        assert_eq!(order.status, KitchenOrderStatus::Completed);
        assert!(order.fired_at.is_some());
        assert!(order.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_transition_guard_rejects_stale_from() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert(&db, &sample_order("k1")).await;

        // Order is PENDING; claiming it was READY must fail
        let mut tx = db.pool().begin().await.unwrap();
        let result = KitchenRepository::transition_tx(
            &mut tx,
            "k1",
            KitchenOrderStatus::Ready,
            KitchenOrderStatus::Completed,
            Utc::now(),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert(&db, &sample_order("k1")).await;
        insert(&db, &sample_order("k2")).await;

        let mut tx = db.pool().begin().await.unwrap();
        KitchenRepository::transition_tx(
            &mut tx,
            "k1",
            KitchenOrderStatus::Pending,
            KitchenOrderStatus::Preparing,
            Utc::now(),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let pending = db
            .kitchen()
            .list(Some(KitchenOrderStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "k2");
    }
}
