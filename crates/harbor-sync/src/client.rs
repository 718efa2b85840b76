//! # Cloud Client
//!
//! A small HTTP/JSON client for the cloud API. Credentials are read from the
//! shared config on every call, so re-pairing takes effect without a
//! restart. The client never retries; retry policy belongs to the engines
//! that call it.
//!
//! ## Response Envelope
//! Every call returns a uniform [`CloudResponse`]: `ok` is true iff the HTTP
//! status was 2xx; network failures and timeouts produce
//! `ok = false, status = 0` with the error message.

use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::SharedConfig;
use crate::error::{SyncError, SyncResult};

/// Per-call timeout for cloud requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Uniform response envelope for cloud calls.
#[derive(Debug, Clone)]
pub struct CloudResponse {
    /// True iff the HTTP status was 2xx.
    pub ok: bool,
    /// HTTP status code; 0 for network failures and timeouts.
    pub status: u16,
    /// Parsed JSON body when the content type is `application/json`.
    pub data: Option<Value>,
    /// Error message for non-2xx responses and transport failures.
    pub error: Option<String>,
}

impl CloudResponse {
    fn transport_failure(message: String) -> Self {
        CloudResponse {
            ok: false,
            status: 0,
            data: None,
            error: Some(message),
        }
    }
}

/// HTTP/JSON client for the cloud API.
#[derive(Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    config: SharedConfig,
}

impl CloudClient {
    pub fn new(config: SharedConfig) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Client(e.to_string()))?;

        Ok(CloudClient { http, config })
    }

    /// True iff base URL and API key are both present. Engines gate on this.
    pub async fn is_configured(&self) -> bool {
        self.config.read().await.is_configured()
    }

    /// GET with optional query parameters.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> CloudResponse {
        let Some((url, identity)) = self.request_parts(path).await else {
            return CloudResponse::transport_failure("hub not configured".into());
        };

        let request = self
            .http
            .get(&url)
            .query(query)
            .header("X-API-Key", &identity.api_key)
            .header("X-Tenant-ID", &identity.tenant_id)
            .header("X-Location-ID", &identity.location_id);

        Self::execute(url, request).await
    }

    /// POST with a JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> CloudResponse {
        let Some((url, identity)) = self.request_parts(path).await else {
            return CloudResponse::transport_failure("hub not configured".into());
        };

        let request = self
            .http
            .post(&url)
            .json(body)
            .header("X-API-Key", &identity.api_key)
            .header("X-Tenant-ID", &identity.tenant_id)
            .header("X-Location-ID", &identity.location_id);

        Self::execute(url, request).await
    }

    /// Reads the live config and builds the URL + identity header values.
    async fn request_parts(&self, path: &str) -> Option<(String, Identity)> {
        let config = self.config.read().await;
        if !config.is_configured() {
            return None;
        }

        let base = config.cloud_base_url.trim_end_matches('/');
        let url = format!("{base}{path}");

        Some((
            url,
            Identity {
                api_key: config.cloud_api_key.clone(),
                tenant_id: config.tenant_id.clone(),
                location_id: config.location_id.clone(),
            },
        ))
    }

    async fn execute(url: String, request: reqwest::RequestBuilder) -> CloudResponse {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %url, error = %e, "Cloud request failed to send");
                return CloudResponse::transport_failure(e.to_string());
            }
        };

        let status = response.status().as_u16();
        let ok = response.status().is_success();

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);

        let (data, body_error) = if is_json {
            match response.json::<Value>().await {
                Ok(value) => (Some(value), None),
                Err(e) => (None, Some(format!("invalid JSON body: {e}"))),
            }
        } else {
            (None, None)
        };

        let error = if ok {
            body_error
        } else {
            Some(
                body_error.unwrap_or_else(|| format!("HTTP {status}")),
            )
        };

        CloudResponse {
            ok,
            status,
            data,
            error,
        }
    }
}

struct Identity {
    api_key: String,
    tenant_id: String,
    location_id: String,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::{Json, Router};

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{addr}")
    }

    fn shared_config(base_url: String) -> SharedConfig {
        let mut config = HubConfig::default();
        config.cloud_base_url = base_url;
        config.cloud_api_key = "test-key".into();
        config.tenant_id = "tenant-1".into();
        config.location_id = "location-1".into();
        config.into_shared()
    }

    #[tokio::test]
    async fn test_identity_headers_and_json_parse() {
        let router = Router::new().route(
            "/api/hub/sync/ping",
            get(|headers: HeaderMap| async move {
                assert_eq!(headers.get("x-api-key").unwrap(), "test-key");
                assert_eq!(headers.get("x-tenant-id").unwrap(), "tenant-1");
                assert_eq!(headers.get("x-location-id").unwrap(), "location-1");
                Json(serde_json::json!({"items": []}))
            }),
        );
        let base = spawn_stub(router).await;
        let client = CloudClient::new(shared_config(base)).unwrap();

        let response = client.get("/api/hub/sync/ping", &[]).await;
        assert!(response.ok);
        assert_eq!(response.status, 200);
        assert!(response.data.unwrap().get("items").is_some());
    }

    #[tokio::test]
    async fn test_non_json_body_yields_null_payload() {
        let router = Router::new().route("/plain", get(|| async { "just text" }));
        let base = spawn_stub(router).await;
        let client = CloudClient::new(shared_config(base)).unwrap();

        let response = client.get("/plain", &[]).await;
        assert!(response.ok);
        assert!(response.data.is_none());
    }

    #[tokio::test]
    async fn test_network_failure_is_status_zero() {
        // Nothing listens on this port
        let client = CloudClient::new(shared_config("http://127.0.0.1:1".into())).unwrap();

        let response = client.get("/anything", &[]).await;
        assert!(!response.ok);
        assert_eq!(response.status, 0);
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn test_unconfigured_client_refuses() {
        let client = CloudClient::new(HubConfig::default().into_shared()).unwrap();
        assert!(!client.is_configured().await);

        let response = client.get("/x", &[]).await;
        assert!(!response.ok);
        assert_eq!(response.status, 0);
    }
}
