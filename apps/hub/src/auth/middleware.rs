//! # Session Middleware
//!
//! Every protected request must carry an `x-session-id` header referring to
//! an active session. Public routes (login, health, the WebSocket upgrade)
//! and CORS preflights skip the check. On success the session identity is
//! injected into request extensions for handlers to read.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Routes reachable without a session.
const PUBLIC_PATHS: &[&str] = &["/health", "/api/auth/pin-login", "/ws"];

/// Identity of the authenticated caller, injected into request extensions.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub session_id: String,
    pub user_id: String,
    pub terminal_id: Option<String>,
}

/// Session-check middleware for every protected route.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // CORS preflight never carries credentials
    if req.method() == axum::http::Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    if PUBLIC_PATHS.contains(&req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let session_id = req
        .headers()
        .get("x-session-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(session_id) = session_id else {
        debug!(path = %req.uri().path(), "Missing x-session-id header");
        return Err(ApiError::unauthorized("Missing session"));
    };

    let session = state
        .db
        .sessions()
        .find_active(&session_id)
        .await
        .map_err(ApiError::from)?;

    let Some(session) = session else {
        debug!(path = %req.uri().path(), "Unknown or ended session");
        return Err(ApiError::unauthorized("Invalid session"));
    };

    // Terminal identity may also ride on its own header
    let terminal_id = session.terminal_id.clone().or_else(|| {
        req.headers()
            .get("x-terminal-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    req.extensions_mut().insert(CurrentSession {
        session_id: session.id,
        user_id: session.user_id,
        terminal_id,
    });

    Ok(next.run(req).await)
}

// =============================================================================
// Client IP Extractor
// =============================================================================

/// Source IP for rate limiting: `x-forwarded-for` when a proxy fronted the
/// request, the socket address otherwise. Falls back to localhost in
/// in-process tests where neither exists.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());

        let ip = forwarded
            .or_else(|| {
                parts
                    .extensions
                    .get::<axum::extract::ConnectInfo<SocketAddr>>()
                    .map(|info| info.0.ip())
            })
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

        Ok(ClientIp(ip))
    }
}
