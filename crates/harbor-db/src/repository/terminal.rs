//! # Terminal Repository
//!
//! POS terminals known to this hub. The realtime bus resolves a peer's role
//! from its terminal row at connect time; clients cannot supply a role.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::DbResult;
use harbor_core::{Terminal, TerminalRole, TerminalStatus};

const TERMINAL_COLUMNS: &str = "id, name, role, status, last_seen_at";

#[derive(Debug, Clone)]
pub struct TerminalRepository {
    pool: SqlitePool,
}

impl TerminalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TerminalRepository { pool }
    }

    /// Registers a terminal, or refreshes its name/role if already known.
    pub async fn register(
        &self,
        id: &str,
        name: Option<&str>,
        role: TerminalRole,
    ) -> DbResult<Terminal> {
        sqlx::query(
            r#"
            INSERT INTO terminals (id, name, role, status, last_seen_at)
            VALUES (?1, ?2, ?3, 'OFFLINE', ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = COALESCE(excluded.name, name),
                role = excluded.role,
                last_seen_at = excluded.last_seen_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(role)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get(id)
            .await?
            .ok_or_else(|| crate::error::DbError::not_found("Terminal", id))
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Terminal>> {
        let terminal = sqlx::query_as(&format!(
            "SELECT {TERMINAL_COLUMNS} FROM terminals WHERE id = ?1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(terminal)
    }

    pub async fn list(&self) -> DbResult<Vec<Terminal>> {
        let terminals = sqlx::query_as(&format!(
            "SELECT {TERMINAL_COLUMNS} FROM terminals ORDER BY id",
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(terminals)
    }

    pub async fn set_status(&self, id: &str, status: TerminalStatus) -> DbResult<()> {
        sqlx::query("UPDATE terminals SET status = ?2, last_seen_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_register_upserts_role() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let terminals = db.terminals();

        let t = terminals
            .register("t1", Some("Front"), TerminalRole::Pos)
            .await
            .unwrap();
        assert_eq!(t.role, TerminalRole::Pos);
        assert_eq!(t.status, TerminalStatus::Offline);

        // Re-register as a kitchen display
        let t = terminals.register("t1", None, TerminalRole::Kds).await.unwrap();
        assert_eq!(t.role, TerminalRole::Kds);
        assert_eq!(t.name.as_deref(), Some("Front"));
    }

    #[tokio::test]
    async fn test_set_status() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let terminals = db.terminals();

        terminals.register("t1", None, TerminalRole::Pos).await.unwrap();
        terminals.set_status("t1", TerminalStatus::Online).await.unwrap();

        let t = terminals.get("t1").await.unwrap().unwrap();
        assert_eq!(t.status, TerminalStatus::Online);
    }
}
