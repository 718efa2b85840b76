//! # PIN Authentication
//!
//! Verifies a terminal PIN against the replicated staff roster using argon2
//! (memory-hard, so each verify costs real time by design).
//!
//! ## MRU Optimization
//! A full scan verifies every active user with a PIN hash - fine for
//! correctness, slow for a big roster. In a restaurant the same few staff
//! log in repeatedly, so a bounded most-recently-used list (<= 5 user ids)
//! is tried first, cutting the common case to a single verify. The cache is
//! a latency optimization only and is cleared whenever a PIN changes
//! through the admin route.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordVerifier};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use harbor_core::User;
use harbor_db::Database;

use crate::error::{ApiError, ApiResult};

/// Bound on the MRU list.
const MRU_CAPACITY: usize = 5;

/// Hashes a PIN for storage (admin PIN updates, seeding, tests).
pub fn hash_pin(pin: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal(format!("PIN hashing failed: {e}")))
}

/// PIN verifier with a bounded MRU cache of recent logins.
#[derive(Clone, Default)]
pub struct PinAuthenticator {
    mru: Arc<Mutex<VecDeque<String>>>,
}

impl PinAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the active user whose PIN hash matches, or `None`.
    ///
    /// MRU users are tried first; the scan then falls through to the rest of
    /// the roster. Verification runs on the blocking pool - argon2 is meant
    /// to be slow and must not stall the reactor.
    pub async fn authenticate(&self, db: &Database, pin: &str) -> ApiResult<Option<User>> {
        let users = db.users().active_pin_users().await?;
        let ordered = self.mru_first(users);
        let pin = pin.to_string();

        let matched = tokio::task::spawn_blocking(move || scan(&ordered, &pin))
            .await
            .map_err(|e| ApiError::internal(format!("PIN verify task failed: {e}")))?;

        if let Some(user) = &matched {
            self.touch(&user.id);
        }

        Ok(matched)
    }

    /// Invalidate the cache after a PIN update.
    pub fn clear_cache(&self) {
        self.mru.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Reorders the roster so MRU users come first.
    fn mru_first(&self, users: Vec<User>) -> Vec<User> {
        let mru = self.mru.lock().unwrap_or_else(|e| e.into_inner());
        if mru.is_empty() {
            return users;
        }

        let (mut front, back): (Vec<User>, Vec<User>) =
            users.into_iter().partition(|u| mru.contains(&u.id));

        // Preserve recency order within the cached group
        front.sort_by_key(|u| mru.iter().position(|id| *id == u.id));
        front.extend(back);
        front
    }

    fn touch(&self, user_id: &str) {
        let mut mru = self.mru.lock().unwrap_or_else(|e| e.into_inner());
        mru.retain(|id| id != user_id);
        mru.push_front(user_id.to_string());
        mru.truncate(MRU_CAPACITY);
    }
}

fn scan(users: &[User], pin: &str) -> Option<User> {
    let argon2 = Argon2::default();

    for user in users {
        let Some(hash_str) = &user.pin_hash else {
            continue;
        };

        let parsed = match PasswordHash::new(hash_str) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Unparsable PIN hash, skipping user");
                continue;
            }
        };

        if argon2.verify_password(pin.as_bytes(), &parsed).is_ok() {
            debug!(user_id = %user.id, "PIN matched");
            return Some(user.clone());
        }
    }

    None
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_db::DbConfig;

    async fn seed_user(db: &Database, id: &str, pin: &str) {
        let hash = hash_pin(pin).unwrap();
        sqlx::query("INSERT INTO users (id, name, pin_hash, is_active) VALUES (?1, ?2, ?3, 1)")
            .bind(id)
            .bind(format!("user {id}"))
            .bind(hash)
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_match_and_miss() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed_user(&db, "u1", "1234").await;
        seed_user(&db, "u2", "9999").await;

        let auth = PinAuthenticator::new();

        let matched = auth.authenticate(&db, "9999").await.unwrap();
        assert_eq!(matched.unwrap().id, "u2");

        let missed = auth.authenticate(&db, "0000").await.unwrap();
        assert!(missed.is_none());
    }

    #[tokio::test]
    async fn test_mru_orders_recent_user_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for (id, pin) in [("a", "1111"), ("b", "2222"), ("c", "3333")] {
            seed_user(&db, id, pin).await;
        }

        let auth = PinAuthenticator::new();
        auth.authenticate(&db, "3333").await.unwrap();

        let users = db.users().active_pin_users().await.unwrap();
        let ordered = auth.mru_first(users);
        assert_eq!(ordered[0].id, "c");
    }

    #[tokio::test]
    async fn test_clear_cache_forgets_recency() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed_user(&db, "a", "1111").await;
        seed_user(&db, "b", "2222").await;

        let auth = PinAuthenticator::new();
        auth.authenticate(&db, "2222").await.unwrap();
        auth.clear_cache();

        let users = db.users().active_pin_users().await.unwrap();
        let ordered = auth.mru_first(users.clone());
        let plain: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
        let cached: Vec<&str> = ordered.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(plain, cached);
    }

    #[test]
    fn test_mru_is_bounded() {
        let auth = PinAuthenticator::new();
        for i in 0..10 {
            auth.touch(&format!("u{i}"));
        }
        assert_eq!(auth.mru.lock().unwrap().len(), MRU_CAPACITY);
    }
}
