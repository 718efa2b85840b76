//! Shared harness for hub integration tests: a full hub on an ephemeral
//! port, a temp-file store, both engines running with long tick intervals
//! (cycles are driven manually through the sync-control routes), and an
//! optional stub cloud.

use std::time::Duration;

use axum::Router;
use harbor_db::{Database, DbConfig};
use harbor_hub::{build_router, build_state};
use harbor_sync::HubConfig;

pub struct TestHub {
    pub base: String,
    pub http: reqwest::Client,
    pub db: Database,
    // Held for the lifetime of the test so the store file survives
    _data_dir: tempfile::TempDir,
}

/// Spawns a hub wired to `cloud_url` (if any). Engine intervals are set far
/// out so tests drive pushes/pulls deterministically via manual triggers.
pub async fn spawn_hub(cloud_url: Option<String>) -> TestHub {
    let data_dir = tempfile::tempdir().unwrap();

    let db = Database::new(DbConfig::new(data_dir.path().join("hub.db")))
        .await
        .unwrap();

    let mut config = HubConfig::default();
    if let Some(url) = cloud_url {
        config.cloud_base_url = url;
        config.cloud_api_key = "test-key".into();
        config.tenant_id = "tenant-1".into();
        config.location_id = "location-1".into();
    }
    config.push_interval_secs = 3600;
    config.pull_interval_secs = 3600;

    let (state, push_engine, pull_engine) = build_state(db.clone(), config.into_shared()).unwrap();
    tokio::spawn(push_engine.run());
    tokio::spawn(pull_engine.run());

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    TestHub {
        base: format!("http://{addr}"),
        http: reqwest::Client::new(),
        db,
        _data_dir: data_dir,
    }
}

/// Spawns a stub cloud and returns its base URL.
pub async fn spawn_cloud(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{addr}")
}

/// Seeds a PIN-capable user straight into the store.
pub async fn seed_user(db: &Database, id: &str, pin: &str) {
    let hash = harbor_hub::auth::hash_pin(pin).unwrap();
    sqlx::query(
        "INSERT INTO users (id, name, role, pin_hash, permissions, is_active) \
         VALUES (?1, ?2, 'cashier', ?3, '[\"sales\"]', 1)",
    )
    .bind(id)
    .bind(format!("user {id}"))
    .bind(hash)
    .execute(db.pool())
    .await
    .unwrap();
}

/// Logs in and returns the session id.
pub async fn login(hub: &TestHub, pin: &str) -> String {
    let response = hub
        .http
        .post(format!("{}/api/auth/pin-login", hub.base))
        .json(&serde_json::json!({ "pin": pin, "terminalId": "term-1" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200, "login must succeed");
    let body: serde_json::Value = response.json().await.unwrap();
    body["sessionId"].as_str().unwrap().to_string()
}

/// Polls until `check` passes or the deadline hits.
pub async fn wait_for<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}
