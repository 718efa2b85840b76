//! End-to-end kitchen scenarios: the bump lifecycle and its outbox trail,
//! plus the pull cycle driven through the sync-control route.

mod common;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use common::{login, seed_user, spawn_cloud, spawn_hub, wait_for};

#[tokio::test]
async fn bump_lifecycle_with_outbox_trail() {
    let hub = spawn_hub(None).await;
    seed_user(&hub.db, "u1", "1234").await;
    let session = login(&hub, "1234").await;

    // Create a PENDING ticket
    let response = hub
        .http
        .post(format!("{}/api/kitchen-orders", hub.base))
        .header("x-session-id", &session)
        .json(&json!({
            "orderNumber": "42",
            "orderType": "DINE_IN",
            "items": [{ "name": "Margherita", "quantity": 1 }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let order_id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["status"], "PENDING");

    // Three bumps walk PENDING -> PREPARING -> READY -> COMPLETED
    let expected = ["PREPARING", "READY", "COMPLETED"];
    for status in expected {
        let response = hub
            .http
            .post(format!("{}/api/kitchen-orders/{order_id}/bump", hub.base))
            .header("x-session-id", &session)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["status"], status);
    }

    let order = hub.db.kitchen().get_by_id(&order_id).await.unwrap().unwrap();
    assert!(order.fired_at.is_some(), "fired_at set on first bump");
    assert!(order.completed_at.is_some(), "completed_at set on last bump");

    // A fourth bump is a no-op, not an error
    let response = hub
        .http
        .post(format!("{}/api/kitchen-orders/{order_id}/bump", hub.base))
        .header("x-session-id", &session)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);

    // One create + three transitions = four outbox rows
    let outbox_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM outbox_queue WHERE entity_id = ?1")
            .bind(&order_id)
            .fetch_one(hub.db.pool())
            .await
            .unwrap();
    assert_eq!(outbox_count, 4);
}

#[tokio::test]
async fn manual_pull_replicates_catalog() {
    // Stub cloud with a tiny catalog; everything else 404s (tolerated)
    let cloud = spawn_cloud(
        Router::new()
            .route(
                "/api/hub/sync/categories",
                get(|| async {
                    Json(json!({"items": [
                        {"id": "c1", "name": "Pizza", "sortOrder": 1, "isActive": true}
                    ]}))
                }),
            )
            .route(
                "/api/hub/sync/products",
                get(|| async {
                    Json(json!({"items": [
                        {"id": "p1", "categoryId": "c1", "name": "Margherita",
                         "price": 11.5, "isActive": true}
                    ]}))
                }),
            ),
    )
    .await;

    let hub = spawn_hub(Some(cloud)).await;
    seed_user(&hub.db, "u1", "1234").await;
    let session = login(&hub, "1234").await;

    hub.http
        .post(format!("{}/api/sync/pull", hub.base))
        .header("x-session-id", &session)
        .send()
        .await
        .unwrap();

    let db = hub.db.clone();
    wait_for("catalog to replicate", move || {
        let db = db.clone();
        async move { db.reference().count("products").await.unwrap() == 1 }
    })
    .await;

    // Terminals read the mirror over the catalog routes
    let response = hub
        .http
        .get(format!("{}/api/products", hub.base))
        .header("x-session-id", &session)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["products"][0]["name"], "Margherita");

    // Sync status shows the per-entity outcome
    let response = hub
        .http
        .get(format!("{}/api/sync/status", hub.base))
        .header("x-session-id", &session)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let entities = body["entities"].as_array().unwrap();
    let products = entities
        .iter()
        .find(|e| e["entityType"] == "products")
        .unwrap();
    assert_eq!(products["status"], "SUCCESS");
    assert_eq!(products["recordCount"], 1);
}

#[tokio::test]
async fn diagnostics_reports_store_shape() {
    let hub = spawn_hub(None).await;
    seed_user(&hub.db, "u1", "1234").await;
    let session = login(&hub, "1234").await;

    let response = hub
        .http
        .get(format!("{}/api/diagnostics", hub.base))
        .header("x-session-id", &session)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert!(body["dbSizeBytes"].as_i64().unwrap() > 0);
    assert!(body["tables"].as_array().unwrap().len() > 10);
    assert_eq!(body["cloudConfigured"], false);
}

#[tokio::test]
async fn health_is_public() {
    let hub = spawn_hub(None).await;

    let response = hub
        .http
        .get(format!("{}/health", hub.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}
