//! # harbor-sync: Cloud Synchronization for Harbor Hub
//!
//! Everything that talks to the cloud: configuration, the HTTP client, and
//! the two periodic engines.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        harbor-sync (THIS CRATE)                         │
//! │                                                                         │
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────────────────────┐ │
//! │  │ HubConfig   │   │ CloudClient  │   │ PushEngine    PullEngine     │ │
//! │  │             │   │              │   │                              │ │
//! │  │ env → file  │──►│ identity     │◄──│ outbox drain  dependency-    │ │
//! │  │ → defaults  │   │ headers,     │   │ with retry/   ordered        │ │
//! │  │ live reload │   │ 30s timeout  │   │ dead-letter   replication    │ │
//! │  └─────────────┘   └──────────────┘   └──────────────────────────────┘ │
//! │                                                                         │
//! │  The engines share the store with the HTTP surface but never each      │
//! │  other's state; coordination is through outbox and sync_state rows.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod error;
pub mod pull;
pub mod push;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{CloudClient, CloudResponse};
pub use config::{HubConfig, SharedConfig};
pub use error::{SyncError, SyncResult};
pub use pull::{PullEngine, PullHandle};
pub use push::{PushEngine, PushHandle};
