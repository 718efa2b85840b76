//! # harbor-db: Store Layer for Harbor Hub
//!
//! This crate owns the hub's embedded SQLite database: a single file with
//! WAL side-files, shared by the HTTP workers and both sync engines.
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration (WAL, FK, busy timeout)
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (outbox, sync state, sales, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use harbor_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/hub.db")).await?;
//!
//! // Atomic business write + outbox row
//! let mut tx = db.pool().begin().await?;
//! SaleRepository::insert_tx(&mut tx, &sale).await?;
//! OutboxRepository::enqueue_tx(&mut tx, &item).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::outbox::{NewOutboxItem, OutboxRepository};
pub use repository::reference::{BatchOutcome, ReferenceRepository, ReferenceRow};
pub use repository::sale::SaleRepository;
pub use repository::sync_state::SyncStateRepository;
