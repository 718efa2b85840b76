//! # Diagnostics Queries
//!
//! Read-only snapshots for `/api/diagnostics`: table counts, outbox depth and
//! age, and the approximate database file size.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::DbResult;

/// Tables reported in the diagnostics summary.
const COUNTED_TABLES: &[&str] = &[
    "users",
    "categories",
    "products",
    "product_variants",
    "modifiers",
    "customers",
    "deals",
    "tables",
    "sales",
    "sale_items",
    "payments",
    "kitchen_orders",
    "cash_drawers",
    "shift_logs",
    "outbox_queue",
    "sessions",
    "terminals",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}

/// Per-table row counts.
pub async fn table_counts(pool: &SqlitePool) -> DbResult<Vec<TableCount>> {
    let mut counts = Vec::with_capacity(COUNTED_TABLES.len());

    for table in COUNTED_TABLES {
        let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await?;
        counts.push(TableCount {
            table: table.to_string(),
            rows,
        });
    }

    Ok(counts)
}

/// Approximate database file size: `page_count * page_size`.
pub async fn database_size_bytes(pool: &SqlitePool) -> DbResult<i64> {
    let size: i64 = sqlx::query_scalar(
        "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
    )
    .fetch_one(pool)
    .await?;

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_snapshot_queries() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let counts = table_counts(db.pool()).await.unwrap();
        assert_eq!(counts.len(), COUNTED_TABLES.len());
        assert!(counts.iter().all(|c| c.rows == 0));

        let size = database_size_bytes(db.pool()).await.unwrap();
        assert!(size > 0);
    }
}
