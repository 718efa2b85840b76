//! # Order Sequence Repository
//!
//! Per-day monotonic receipt numbers. The counter row is upserted with a
//! single atomic statement, so concurrent callers always mint distinct,
//! contiguous values.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::DbResult;
use harbor_core::ids;

#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Mints the next receipt number for today, formatted `YYYYMMDD-NNNN`.
    ///
    /// The increment is a single
    /// `INSERT ... ON CONFLICT DO UPDATE ... RETURNING` statement; SQLite
    /// serializes it, so 1000 concurrent calls produce 1000 distinct values
    /// forming a contiguous range starting at 1.
    pub async fn next_receipt_number(&self) -> DbResult<String> {
        let date_key = ids::date_key(Utc::now());
        let value = self.next_value(&date_key).await?;
        Ok(ids::format_receipt_number(&date_key, value))
    }

    /// Atomically increments and returns the counter for a date key.
    pub async fn next_value(&self, date_key: &str) -> DbResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO order_sequences (date_key, current_value)
            VALUES (?1, 1)
            ON CONFLICT(date_key) DO UPDATE SET current_value = current_value + 1
            RETURNING current_value
            "#,
        )
        .bind(date_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(value)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_sequence_starts_at_one_per_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sequences();

        assert_eq!(repo.next_value("20260801").await.unwrap(), 1);
        assert_eq!(repo.next_value("20260801").await.unwrap(), 2);
        // A new day starts its own counter
        assert_eq!(repo.next_value("20260802").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_receipt_number_format() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let receipt = db.sequences().next_receipt_number().await.unwrap();

        let (date_part, seq_part) = receipt.split_once('-').unwrap();
        assert_eq!(date_part.len(), 8);
        assert_eq!(seq_part, "0001");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_mints_are_distinct_and_contiguous() {
        // File-backed DB so multiple pool connections genuinely contend.
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("seq.db")).max_connections(8);
        let db = Database::new(config).await.unwrap();

        const N: usize = 1000;
        let mut handles = Vec::with_capacity(N);
        for _ in 0..N {
            let repo = db.sequences();
            handles.push(tokio::spawn(
                async move { repo.next_value("20260801").await },
            ));
        }

        let mut values = HashSet::new();
        for handle in handles {
            let value = handle.await.unwrap().unwrap();
            assert!(values.insert(value), "duplicate sequence value {value}");
        }

        assert_eq!(values.len(), N);
        assert_eq!(*values.iter().min().unwrap(), 1);
        assert_eq!(*values.iter().max().unwrap(), N as i64);
    }
}
