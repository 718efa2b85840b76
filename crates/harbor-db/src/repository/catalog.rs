//! # Catalog Repository
//!
//! Read-only access to the replicated product catalog for terminal-facing
//! listings. The pull engine is the only writer of these tables.

use sqlx::SqlitePool;

use crate::error::DbResult;
use harbor_core::{Category, Product};

const PRODUCT_COLUMNS: &str = "id, tenant_id, category_id, name, description, price, tax_id, \
     is_active, sort_order, image_url, updated_at";

const CATEGORY_COLUMNS: &str = "id, tenant_id, name, sort_order, is_active, updated_at";

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Active products, optionally narrowed to one category.
    pub async fn list_products(&self, category_id: Option<&str>) -> DbResult<Vec<Product>> {
        let products = match category_id {
            Some(category_id) => {
                sqlx::query_as(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products \
                     WHERE is_active = 1 AND category_id = ?1 \
                     ORDER BY sort_order, name",
                ))
                .bind(category_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 \
                     ORDER BY sort_order, name",
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(products)
    }

    pub async fn list_categories(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_active = 1 \
             ORDER BY sort_order, name",
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_listing_filters_inactive_and_by_category() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        sqlx::query(
            "INSERT INTO categories (id, name, is_active) VALUES ('c1', 'Drinks', 1), ('c2', 'Food', 1)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO products (id, category_id, name, price, is_active) VALUES \
             ('p1', 'c1', 'Cola', 2.5, 1), \
             ('p2', 'c1', 'Retired', 1.0, 0), \
             ('p3', 'c2', 'Burger', 8.0, 1)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let all = db.catalog().list_products(None).await.unwrap();
        assert_eq!(all.len(), 2);

        let drinks = db.catalog().list_products(Some("c1")).await.unwrap();
        assert_eq!(drinks.len(), 1);
        assert_eq!(drinks[0].name, "Cola");

        let categories = db.catalog().list_categories().await.unwrap();
        assert_eq!(categories.len(), 2);
    }
}
