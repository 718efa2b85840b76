//! # Catalog Routes
//!
//! Read-only reference lookups for terminals: single-statement selects over
//! the replicated mirror tables.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductsParams {
    pub category_id: Option<String>,
}

/// `GET /api/products`
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ProductsParams>,
) -> ApiResult<Json<Value>> {
    let products = state
        .db
        .catalog()
        .list_products(params.category_id.as_deref())
        .await?;

    Ok(Json(json!({ "products": products })))
}

/// `GET /api/categories`
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let categories = state.db.catalog().list_categories().await?;
    Ok(Json(json!({ "categories": categories })))
}
