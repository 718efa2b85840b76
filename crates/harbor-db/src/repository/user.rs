//! # User Repository
//!
//! Read access to the replicated staff roster, plus the one local mutation
//! the hub supports: an administrative PIN update. Users are otherwise
//! cloud-owned and overwritten by the pull engine.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{DbError, DbResult};
use harbor_core::User;

const USER_COLUMNS: &str =
    "id, tenant_id, name, role, pin_hash, permissions, max_discount, is_active, updated_at";

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Active users that can PIN-authenticate: a non-null hash is the filter,
    /// so staff without hub access never enter the verify loop.
    pub async fn active_pin_users(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE is_active = 1 AND pin_hash IS NOT NULL ORDER BY name",
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Administrative PIN update. The caller is responsible for invalidating
    /// the MRU login cache afterwards.
    pub async fn update_pin_hash(&self, user_id: &str, pin_hash: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET pin_hash = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(user_id)
            .bind(pin_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", user_id));
        }

        Ok(())
    }
}
