//! # Auth Routes
//!
//! PIN login (public, rate limited), logout, and the administrative PIN
//! update that also invalidates the MRU login cache.

use axum::extract::{Extension, Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use harbor_core::validation::validate_pin;
use harbor_core::{new_id, TerminalStatus};

use crate::auth::{ClientIp, CurrentSession};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinLoginRequest {
    pub pin: String,
    pub terminal_id: Option<String>,
}

/// `POST /api/auth/pin-login`
///
/// Rate limit first (every attempt counts, correct PIN or not), then
/// structural validation, then the roster scan.
pub async fn pin_login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<PinLoginRequest>,
) -> ApiResult<Json<Value>> {
    if !state.limiter.check(ip) {
        return Err(ApiError::rate_limited());
    }

    validate_pin(&body.pin)?;

    let Some(user) = state.pin_auth.authenticate(&state.db, &body.pin).await? else {
        return Err(ApiError::unauthorized("Invalid PIN"));
    };

    let session_id = new_id();
    state
        .db
        .sessions()
        .create(&session_id, body.terminal_id.as_deref(), &user.id)
        .await?;

    if let Some(terminal_id) = &body.terminal_id {
        state
            .db
            .terminals()
            .set_status(terminal_id, TerminalStatus::Online)
            .await?;
    }

    info!(user_id = %user.id, terminal_id = ?body.terminal_id, "PIN login");

    let permissions: Value = user
        .permissions
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_else(|| json!([]));

    Ok(Json(json!({
        "sessionId": session_id,
        "user": {
            "id": user.id,
            "name": user.name,
            "role": user.role,
            "permissions": permissions,
            "maxDiscount": user.max_discount,
        },
    })))
}

/// `POST /api/auth/logout`
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> ApiResult<Json<Value>> {
    state.db.sessions().end(&session.session_id).await?;

    info!(user_id = %session.user_id, "Logout");
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePinRequest {
    pub pin: String,
}

/// `POST /api/auth/users/{id}/pin` - administrative PIN update.
///
/// The MRU login cache holds user ids whose hashes may now be stale, so it
/// is cleared here.
pub async fn update_pin(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<UpdatePinRequest>,
) -> ApiResult<Json<Value>> {
    validate_pin(&body.pin)?;

    let hash = crate::auth::hash_pin(&body.pin)?;
    state.db.users().update_pin_hash(&user_id, &hash).await?;
    state.pin_auth.clear_cache();

    info!(user_id = %user_id, "PIN updated");
    Ok(Json(json!({ "success": true })))
}
