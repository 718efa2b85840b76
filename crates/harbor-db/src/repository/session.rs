//! # Session Repository
//!
//! Terminal sessions minted by PIN login and checked on every protected
//! request. Sessions have no timeout; they end on explicit logout or
//! administrative action.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::DbResult;
use harbor_core::Session;

const SESSION_COLUMNS: &str = "id, terminal_id, user_id, is_active, started_at, ended_at";

#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    pub async fn create(&self, id: &str, terminal_id: Option<&str>, user_id: &str) -> DbResult<Session> {
        let session = Session {
            id: id.to_string(),
            terminal_id: terminal_id.map(str::to_string),
            user_id: user_id.to_string(),
            is_active: true,
            started_at: Utc::now(),
            ended_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO sessions (id, terminal_id, user_id, is_active, started_at, ended_at)
            VALUES (?1, ?2, ?3, 1, ?4, NULL)
            "#,
        )
        .bind(&session.id)
        .bind(&session.terminal_id)
        .bind(&session.user_id)
        .bind(session.started_at)
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    /// Looks up an active session by id. Ended sessions return `None`.
    pub async fn find_active(&self, id: &str) -> DbResult<Option<Session>> {
        let session = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1 AND is_active = 1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Invalidates a session (logout). Idempotent.
    pub async fn end(&self, id: &str) -> DbResult<()> {
        sqlx::query("UPDATE sessions SET is_active = 0, ended_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
