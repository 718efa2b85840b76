//! # harbor-hub: The Hub Server
//!
//! Terminal-facing HTTP/WebSocket surface and process wiring for the edge
//! sync hub.
//!
//! ## Request Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Request Path                                    │
//! │                                                                         │
//! │  Terminal ──► CORS ──► session middleware ──► handler                   │
//! │                              │                   │                      │
//! │                     x-session-id lookup    validate → tx →              │
//! │                     (public routes skip)   business rows + outbox →     │
//! │                                            commit → broadcast           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod error;
pub mod realtime;
pub mod routes;
pub mod state;

use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use harbor_db::Database;
use harbor_sync::{CloudClient, PullEngine, PushEngine, SharedConfig, SyncResult};

use crate::auth::{require_session, PinAuthenticator, RateLimiter};
use crate::realtime::RealtimeBus;
use crate::state::AppState;

/// Builds the application state and both engines. The engines are returned
/// unstarted; the caller spawns their run loops and keeps the handles (via
/// the state) for manual triggers and shutdown.
pub fn build_state(
    db: Database,
    config: SharedConfig,
) -> SyncResult<(AppState, PushEngine, PullEngine)> {
    let cloud = CloudClient::new(config.clone())?;

    let (push_engine, push_handle) = PushEngine::new(db.clone(), cloud.clone(), config.clone());
    let (pull_engine, pull_handle) = PullEngine::new(db.clone(), cloud.clone(), config.clone());

    let state = AppState {
        db,
        config,
        cloud,
        bus: RealtimeBus::new(),
        limiter: Arc::new(RateLimiter::new()),
        pin_auth: PinAuthenticator::new(),
        push: push_handle,
        pull: pull_handle,
    };

    Ok((state, push_engine, pull_engine))
}

/// Builds the full router: routes, session middleware, CORS.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Public surface
        .route("/health", get(routes::diagnostics::health))
        .route("/ws", get(realtime::ws_handler))
        .route("/api/auth/pin-login", post(routes::auth::pin_login))
        // Sessions
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/auth/users/{id}/pin", post(routes::auth::update_pin))
        // Sales
        .route(
            "/api/sales",
            post(routes::sales::create_sale).get(routes::sales::list_sales),
        )
        .route("/api/sales/{id}", get(routes::sales::get_sale))
        .route("/api/sales/{id}/void", post(routes::sales::void_sale))
        .route("/api/sales/{id}/refund", post(routes::sales::refund_sale))
        // Kitchen
        .route(
            "/api/kitchen-orders",
            post(routes::kitchen::create_order).get(routes::kitchen::list_orders),
        )
        .route("/api/kitchen-orders/{id}", put(routes::kitchen::update_order))
        .route("/api/kitchen-orders/{id}/bump", post(routes::kitchen::bump_order))
        // Cash drawers
        .route("/api/drawers/open", post(routes::drawers::open_drawer))
        .route("/api/drawers/{id}", get(routes::drawers::get_drawer))
        .route("/api/drawers/{id}/close", post(routes::drawers::close_drawer))
        .route(
            "/api/drawers/{id}/transactions",
            post(routes::drawers::add_transaction),
        )
        // Shifts
        .route("/api/shifts/start", post(routes::shifts::start_shift))
        .route("/api/shifts/{id}", get(routes::shifts::get_shift))
        .route("/api/shifts/{id}/end", post(routes::shifts::end_shift))
        .route("/api/shifts/{id}/breaks", post(routes::shifts::start_break))
        .route("/api/shifts/{id}/breaks/end", post(routes::shifts::end_break))
        // Tables
        .route("/api/table-sessions", post(routes::tables::open_table))
        .route(
            "/api/table-sessions/{id}/close",
            post(routes::tables::close_table),
        )
        // Guest checks & store credit
        .route("/api/guest-checks", post(routes::checks::create_check))
        .route(
            "/api/guest-checks/{id}/close",
            post(routes::checks::close_check),
        )
        .route("/api/store-credit", post(routes::checks::add_credit))
        .route(
            "/api/store-credit/{customer_id}",
            get(routes::checks::get_balance),
        )
        // Caller-ID pass-through
        .route("/api/calls/incoming", post(routes::calls::incoming))
        .route("/api/calls/{id}/answer", post(routes::calls::answer))
        .route("/api/calls/{id}/end", post(routes::calls::end))
        .route("/api/calls/{id}/dismiss", post(routes::calls::dismiss))
        // Terminals
        .route("/api/terminals/register", post(routes::terminals::register))
        .route("/api/terminals", get(routes::terminals::list))
        .route("/api/terminals/{id}", get(routes::terminals::get))
        // Catalog (read-only reference mirrors)
        .route("/api/products", get(routes::catalog::list_products))
        .route("/api/categories", get(routes::catalog::list_categories))
        // Sync controls & observability
        .route("/api/sync/status", get(routes::sync_admin::status))
        .route("/api/sync/push", post(routes::sync_admin::trigger_push))
        .route("/api/sync/pull", post(routes::sync_admin::trigger_pull))
        .route(
            "/api/sync/retry-dead-letters",
            post(routes::sync_admin::retry_dead_letters),
        )
        .route("/api/sync/reset", post(routes::sync_admin::reset_cursors))
        .route("/api/diagnostics", get(routes::diagnostics::diagnostics))
        // Middleware (outermost layers run first)
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
