//! # Application State
//!
//! Shared state handed to every route. The engines are owned as handles:
//! startup wires one push and one pull engine, the sync-control routes poke
//! them through these handles, and shutdown stops them explicitly. No
//! module-level globals.

use std::sync::Arc;

use harbor_db::Database;
use harbor_sync::{CloudClient, PullHandle, PushHandle, SharedConfig};

use crate::auth::{PinAuthenticator, RateLimiter};
use crate::realtime::RealtimeBus;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: SharedConfig,
    pub cloud: CloudClient,
    pub bus: RealtimeBus,
    pub limiter: Arc<RateLimiter>,
    pub pin_auth: PinAuthenticator,
    pub push: PushHandle,
    pub pull: PullHandle,
}
