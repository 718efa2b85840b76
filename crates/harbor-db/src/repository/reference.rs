//! # Reference Repository
//!
//! Write path for cloud-owned mirror tables. The pull engine hands this
//! repository transformed rows (snake_case keys, scalars only) and an
//! enumerated column list per entity; nothing here is derived from cloud
//! input at runtime.
//!
//! ## Upsert Semantics
//! ```text
//! INSERT INTO <table> (id, c2, c3, ...) VALUES (?, ?, ?, ...)
//! ON CONFLICT(id) DO UPDATE SET c2 = excluded.c2, c3 = excluded.c3, ...
//! ```
//! Every column except the primary key is overwritten from the cloud; local
//! edits to reference entities are not supported. Per-row failures are
//! logged and skipped - one malformed row must not abort its batch.

use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::warn;

use crate::error::DbResult;

/// Result of applying a batch of reference rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOutcome {
    pub applied: usize,
    pub skipped: usize,
}

/// A transformed cloud row: snake_case keys, scalar values.
pub type ReferenceRow = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct ReferenceRepository {
    pool: SqlitePool,
}

impl ReferenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReferenceRepository { pool }
    }

    /// Upserts a batch of rows in a single transaction.
    pub async fn upsert_batch(
        &self,
        table: &'static str,
        columns: &[&'static str],
        rows: &[ReferenceRow],
    ) -> DbResult<BatchOutcome> {
        let mut tx = self.pool.begin().await?;
        let outcome = Self::upsert_rows_tx(&mut tx, table, columns, rows).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Upserts rows inside an open transaction. Rows without an `id`, and
    /// rows the database rejects (bad type, broken foreign key), are skipped.
    pub async fn upsert_rows_tx(
        conn: &mut SqliteConnection,
        table: &'static str,
        columns: &[&'static str],
        rows: &[ReferenceRow],
    ) -> DbResult<BatchOutcome> {
        let sql = upsert_sql(table, columns);
        let mut outcome = BatchOutcome::default();

        for row in rows {
            let id = row.get("id").and_then(Value::as_str);
            if id.is_none() {
                warn!(table, "Skipping reference row without id");
                outcome.skipped += 1;
                continue;
            }

            let mut query = sqlx::query(&sql);
            for column in columns {
                query = bind_json(query, row.get(*column));
            }

            match query.execute(&mut *conn).await {
                Ok(_) => outcome.applied += 1,
                Err(e) => {
                    warn!(table, id = id.unwrap_or(""), error = %e, "Skipping bad reference row");
                    outcome.skipped += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Full-replace semantics: within one transaction, DELETE the whole table
    /// then INSERT the new rows. Used for tables whose cloud ids are recycled
    /// across syncs (pizza pricing).
    pub async fn replace_all(
        &self,
        table: &'static str,
        columns: &[&'static str],
        rows: &[ReferenceRow],
    ) -> DbResult<BatchOutcome> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *tx)
            .await?;

        let outcome = Self::upsert_rows_tx(&mut tx, table, columns, rows).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Deletes rows by id inside an open transaction, cleaning child rows
    /// first. Used when a pull response carries a `deletedIds` list.
    pub async fn delete_ids_tx(
        conn: &mut SqliteConnection,
        table: &'static str,
        children: &[(&'static str, &'static str)],
        ids: &[String],
    ) -> DbResult<u64> {
        let mut deleted = 0;

        for id in ids {
            for (child_table, fk_column) in children {
                sqlx::query(&format!("DELETE FROM {child_table} WHERE {fk_column} = ?1"))
                    .bind(id)
                    .execute(&mut *conn)
                    .await?;
            }

            let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = ?1"))
                .bind(id)
                .execute(&mut *conn)
                .await?;
            deleted += result.rows_affected();
        }

        Ok(deleted)
    }

    /// Row count for one mirror table (diagnostics, tests).
    pub async fn count(&self, table: &'static str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Builds the upsert statement for a table and its enumerated columns.
/// The first column is expected to be `id`.
fn upsert_sql(table: &str, columns: &[&str]) -> String {
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");

    let updates = columns
        .iter()
        .filter(|c| **c != "id")
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders}) ON CONFLICT(id) DO UPDATE SET {updates}",
        columns.join(", "),
    )
}

/// Binds one transformed JSON value. The transform step has already coerced
/// booleans to 0/1 and stringified nested structures, so only scalars are
/// expected; anything else falls back to its JSON text.
fn bind_json<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: Option<&Value>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        None | Some(Value::Null) => query.bind(None::<String>),
        Some(Value::String(s)) => query.bind(s.clone()),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or(0.0))
            }
        }
        Some(Value::Bool(b)) => query.bind(*b as i64),
        Some(other) => query.bind(other.to_string()),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use serde_json::json;

    const CATEGORY_COLUMNS: &[&str] = &["id", "name", "sort_order", "is_active", "updated_at"];

    fn row(value: Value) -> ReferenceRow {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_upsert_overwrites_all_columns() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let reference = db.reference();

        let rows = vec![row(json!({
            "id": "c1", "name": "Drinks", "sort_order": 1, "is_active": 1
        }))];
        let outcome = reference
            .upsert_batch("categories", CATEGORY_COLUMNS, &rows)
            .await
            .unwrap();
        assert_eq!(outcome.applied, 1);

        // Second pull renames and deactivates; every column is overwritten
        let rows = vec![row(json!({
            "id": "c1", "name": "Beverages", "sort_order": 2, "is_active": 0
        }))];
        reference
            .upsert_batch("categories", CATEGORY_COLUMNS, &rows)
            .await
            .unwrap();

        let (name, active): (String, i64) =
            sqlx::query_as("SELECT name, is_active FROM categories WHERE id = 'c1'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(name, "Beverages");
        assert_eq!(active, 0);
        assert_eq!(reference.count("categories").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_row_without_id_is_skipped_not_fatal() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let rows = vec![
            row(json!({"name": "orphan"})),
            row(json!({"id": "c2", "name": "Food", "is_active": 1})),
        ];
        let outcome = db
            .reference()
            .upsert_batch("categories", CATEGORY_COLUMNS, &rows)
            .await
            .unwrap();

        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn test_replace_all_drops_stale_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let reference = db.reference();
        const PRICE_COLUMNS: &[&str] = &["id", "topping_id", "size_id", "price"];

        let first = vec![
            row(json!({"id": "p1", "topping_id": "t1", "size_id": "s1", "price": 1.5})),
            row(json!({"id": "p2", "topping_id": "t1", "size_id": "s2", "price": 2.0})),
        ];
        reference
            .replace_all("pizza_topping_prices", PRICE_COLUMNS, &first)
            .await
            .unwrap();

        // Next sync recycles id p1 with different content and drops p2
        let second = vec![row(
            json!({"id": "p1", "topping_id": "t9", "size_id": "s1", "price": 9.0}),
        )];
        reference
            .replace_all("pizza_topping_prices", PRICE_COLUMNS, &second)
            .await
            .unwrap();

        assert_eq!(reference.count("pizza_topping_prices").await.unwrap(), 1);
        let topping: String =
            sqlx::query_scalar("SELECT topping_id FROM pizza_topping_prices WHERE id = 'p1'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(topping, "t9");
    }

    #[tokio::test]
    async fn test_delete_ids_removes_children_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let reference = db.reference();

        const DEAL_COLUMNS: &[&str] = &["id", "name", "is_active"];
        const DEAL_ITEM_COLUMNS: &[&str] = &["id", "deal_id", "product_id", "quantity"];

        reference
            .upsert_batch(
                "deals",
                DEAL_COLUMNS,
                &[row(json!({"id": "d1", "name": "Lunch", "is_active": 1}))],
            )
            .await
            .unwrap();
        reference
            .upsert_batch(
                "deal_items",
                DEAL_ITEM_COLUMNS,
                &[row(json!({"id": "di1", "deal_id": "d1", "product_id": "p1", "quantity": 1}))],
            )
            .await
            .unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let deleted = ReferenceRepository::delete_ids_tx(
            &mut tx,
            "deals",
            &[("deal_items", "deal_id")],
            &["d1".to_string()],
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(reference.count("deals").await.unwrap(), 0);
        assert_eq!(reference.count("deal_items").await.unwrap(), 0);
    }

    #[test]
    fn test_upsert_sql_shape() {
        let sql = upsert_sql("categories", &["id", "name"]);
        assert_eq!(
            sql,
            "INSERT INTO categories (id, name) VALUES (?1, ?2) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name"
        );
    }
}
