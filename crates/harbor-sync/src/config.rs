//! # Hub Configuration
//!
//! Three-layer configuration resolution for the hub.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     HUB_CLOUD_URL, HUB_CLOUD_API_KEY, HUB_TENANT_ID, ...               │
//! │                                                                         │
//! │  2. Persisted JSON file                                                │
//! │     <platform config dir>/harbor-hub/hub.json                          │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     port 4001, push every 5s, pull every 60s                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The runtime holds the config behind an `Arc<RwLock<..>>`; the cloud
//! client reads credentials on every call, so re-pairing takes effect
//! without a restart. Saves are atomic: write a temp file, then rename.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

/// Shared, live-reloadable hub configuration.
pub type SharedConfig = Arc<RwLock<HubConfig>>;

// =============================================================================
// Hub Configuration
// =============================================================================

/// Complete hub configuration.
///
/// ## Example Config File
/// ```json
/// {
///   "cloudBaseUrl": "https://cloud.example.com",
///   "cloudApiKey": "hub_k3y...",
///   "tenantId": "tenant-1",
///   "locationId": "location-9",
///   "hubSecret": "s3cret",
///   "httpPort": 4001
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubConfig {
    /// Base URL of the cloud API. Empty until the hub is paired.
    pub cloud_base_url: String,

    /// API key issued at pairing time.
    pub cloud_api_key: String,

    /// Tenant this hub belongs to.
    pub tenant_id: String,

    /// Physical location this hub serves.
    pub location_id: String,

    /// Secret shared with terminals on the LAN.
    pub hub_secret: String,

    /// Port the terminal-facing HTTP surface listens on.
    pub http_port: u16,

    /// Path of the SQLite store. `None` resolves to the platform data dir.
    pub db_path: Option<PathBuf>,

    /// Seconds between push engine ticks.
    pub push_interval_secs: u64,

    /// Outbox items claimed per push tick.
    pub push_batch_size: i64,

    /// Seconds between pull engine cycles.
    pub pull_interval_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            cloud_base_url: String::new(),
            cloud_api_key: String::new(),
            tenant_id: String::new(),
            location_id: String::new(),
            hub_secret: String::new(),
            http_port: 4001,
            db_path: None,
            push_interval_secs: 5,
            push_batch_size: 20,
            pull_interval_secs: 60,
        }
    }
}

impl HubConfig {
    /// True iff the hub is paired: both base URL and API key present.
    /// Both engines gate their work on this.
    pub fn is_configured(&self) -> bool {
        !self.cloud_base_url.is_empty() && !self.cloud_api_key.is_empty()
    }

    /// Loads configuration from defaults, then the persisted file, then the
    /// environment.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading hub config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = serde_json::from_str(&contents)
                    .map_err(|e| SyncError::ConfigLoadFailed(e.to_string()))?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or falls back to defaults on failure.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load hub config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration with an atomic overwrite: write to a sibling temp
    /// file, then rename over the target.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, contents)
            .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        std::fs::rename(&tmp_path, &path)
            .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Hub config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.http_port == 0 {
            return Err(SyncError::InvalidConfig("httpPort must be non-zero".into()));
        }

        if self.push_interval_secs == 0 || self.pull_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "engine intervals must be non-zero".into(),
            ));
        }

        if self.push_batch_size <= 0 {
            return Err(SyncError::InvalidConfig(
                "pushBatchSize must be positive".into(),
            ));
        }

        if !self.cloud_base_url.is_empty()
            && !self.cloud_base_url.starts_with("http://")
            && !self.cloud_base_url.starts_with("https://")
        {
            return Err(SyncError::InvalidConfig(format!(
                "cloudBaseUrl must start with http:// or https://, got: {}",
                self.cloud_base_url
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("HUB_CLOUD_URL") {
            debug!("Overriding cloud base URL from environment");
            self.cloud_base_url = url;
        }
        if let Ok(key) = std::env::var("HUB_CLOUD_API_KEY") {
            self.cloud_api_key = key;
        }
        if let Ok(tenant) = std::env::var("HUB_TENANT_ID") {
            self.tenant_id = tenant;
        }
        if let Ok(location) = std::env::var("HUB_LOCATION_ID") {
            self.location_id = location;
        }
        if let Ok(secret) = std::env::var("HUB_SECRET") {
            self.hub_secret = secret;
        }
        if let Ok(port) = std::env::var("HUB_PORT") {
            match port.parse() {
                Ok(port) => self.http_port = port,
                Err(_) => warn!(port, "Ignoring invalid HUB_PORT"),
            }
        }
        if let Ok(path) = std::env::var("HUB_DB_PATH") {
            self.db_path = Some(PathBuf::from(path));
        }
    }

    /// Platform config file location: `<config dir>/harbor-hub/hub.json`.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "harbor", "harbor-hub")
            .map(|dirs| dirs.config_dir().join("hub.json"))
    }

    /// Resolved database path: configured value or the platform data dir.
    pub fn resolved_db_path(&self) -> PathBuf {
        if let Some(path) = &self.db_path {
            return path.clone();
        }

        directories::ProjectDirs::from("", "harbor", "harbor-hub")
            .map(|dirs| dirs.data_dir().join("hub.db"))
            .unwrap_or_else(|| PathBuf::from("hub.db"))
    }

    /// Wraps the config for shared runtime access.
    pub fn into_shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }
}

// =============================================================================
// Tests
// =============================================================================
