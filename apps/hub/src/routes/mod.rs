//! # Route Modules
//!
//! Every state-mutating route follows the same five steps: validate, open a
//! transaction, write business rows, write one outbox row, commit - then
//! broadcast. Read-only routes are single-statement selects.

pub mod auth;
pub mod calls;
pub mod catalog;
pub mod checks;
pub mod diagnostics;
pub mod drawers;
pub mod kitchen;
pub mod sales;
pub mod shifts;
pub mod sync_admin;
pub mod tables;
pub mod terminals;
