//! # Pull Plan
//!
//! The static, dependency-ordered list of replicated entities. A referenced
//! table always appears before the tables that reference it (categories
//! before products, deals before deal items, pizza base config before
//! pricing), so foreign keys hold without deferred constraints. Runtime
//! walks the same order every cycle.

/// How an entity's rows are applied to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullMode {
    /// `INSERT ... ON CONFLICT(id) DO UPDATE` per row.
    Upsert,
    /// DELETE the whole table, then insert - for tables whose cloud ids are
    /// recycled across syncs.
    Replace,
}

/// One entity in the pull plan.
#[derive(Debug, Clone, Copy)]
pub struct EntityPull {
    /// Sync-state key; also used in logs.
    pub entity: &'static str,
    /// Path segment under `/api/hub/sync/`.
    pub endpoint: &'static str,
    /// Target mirror table.
    pub table: &'static str,
    /// Enumerated column list; the first column is `id`.
    pub columns: &'static [&'static str],
    pub mode: PullMode,
    /// Per-entity field renames applied before the camelCase rule.
    pub renames: &'static [(&'static str, &'static str)],
    /// Whether `lastSyncedAt` is sent as the `sinceVersion` delta cursor.
    /// Entities without a cursor full-fetch and rely on cheap upserts.
    pub uses_cursor: bool,
    /// Child tables cleaned up when the response carries `deletedIds`.
    pub deleted_children: &'static [(&'static str, &'static str)],
}

/// Shared rename set for the pizza size-id quirk: the cloud emits either
/// `sizeId` or `pizzaSizeId` depending on endpoint vintage.
const SIZE_ID_RENAMES: &[(&str, &str)] = &[
    ("sizeId", "size_id"),
    ("pizzaSizeId", "size_id"),
    ("pizzaToppingId", "topping_id"),
    ("toppingId", "topping_id"),
];

/// The dependency-ordered pull plan.
pub static PULL_PLAN: &[EntityPull] = &[
    EntityPull {
        entity: "users",
        endpoint: "users",
        table: "users",
        columns: &[
            "id", "tenant_id", "name", "role", "pin_hash", "permissions", "max_discount",
            "is_active", "updated_at",
        ],
        mode: PullMode::Upsert,
        renames: &[],
        uses_cursor: true,
        deleted_children: &[],
    },
    EntityPull {
        entity: "categories",
        endpoint: "categories",
        table: "categories",
        columns: &["id", "tenant_id", "name", "sort_order", "is_active", "updated_at"],
        mode: PullMode::Upsert,
        renames: &[],
        uses_cursor: true,
        deleted_children: &[],
    },
    EntityPull {
        entity: "taxes",
        endpoint: "taxes",
        table: "taxes",
        columns: &["id", "tenant_id", "name", "rate", "is_active", "updated_at"],
        mode: PullMode::Upsert,
        renames: &[],
        uses_cursor: true,
        deleted_children: &[],
    },
    // Products reference categories and taxes; their response also embeds
    // order-type prices and the pizza product config (handled by the engine).
    EntityPull {
        entity: "products",
        endpoint: "products",
        table: "products",
        columns: &[
            "id", "tenant_id", "category_id", "name", "description", "price", "tax_id",
            "is_active", "sort_order", "image_url", "updated_at",
        ],
        mode: PullMode::Upsert,
        renames: &[],
        uses_cursor: true,
        deleted_children: &[
            ("product_order_type_prices", "product_id"),
            ("product_pizza_configs", "product_id"),
            ("product_variants", "product_id"),
        ],
    },
    EntityPull {
        entity: "product_variants",
        endpoint: "product-variants",
        table: "product_variants",
        columns: &["id", "product_id", "name", "price", "sku", "is_active", "updated_at"],
        mode: PullMode::Upsert,
        renames: &[],
        uses_cursor: true,
        deleted_children: &[],
    },
    EntityPull {
        entity: "modifier_groups",
        endpoint: "modifier-groups",
        table: "modifier_groups",
        columns: &[
            "id", "tenant_id", "name", "min_select", "max_select", "is_active", "updated_at",
        ],
        mode: PullMode::Upsert,
        renames: &[],
        uses_cursor: true,
        deleted_children: &[],
    },
    EntityPull {
        entity: "modifiers",
        endpoint: "modifiers",
        table: "modifiers",
        columns: &["id", "modifier_group_id", "name", "price", "is_active", "updated_at"],
        mode: PullMode::Upsert,
        renames: &[("groupId", "modifier_group_id")],
        uses_cursor: true,
        deleted_children: &[],
    },
    EntityPull {
        entity: "customers",
        endpoint: "customers",
        table: "customers",
        columns: &[
            "id", "tenant_id", "name", "phone", "email", "address", "notes", "is_active",
            "updated_at",
        ],
        mode: PullMode::Upsert,
        renames: &[],
        uses_cursor: true,
        deleted_children: &[],
    },
    EntityPull {
        entity: "deals",
        endpoint: "deals",
        table: "deals",
        columns: &[
            "id", "tenant_id", "name", "description", "price", "starts_at", "ends_at",
            "is_active", "updated_at",
        ],
        mode: PullMode::Upsert,
        renames: &[],
        uses_cursor: true,
        deleted_children: &[("deal_items", "deal_id")],
    },
    EntityPull {
        entity: "deal_items",
        endpoint: "deal-items",
        table: "deal_items",
        columns: &["id", "deal_id", "product_id", "quantity", "updated_at"],
        mode: PullMode::Upsert,
        renames: &[],
        uses_cursor: true,
        deleted_children: &[],
    },
    EntityPull {
        entity: "pizza_sizes",
        endpoint: "pizza-sizes",
        table: "pizza_sizes",
        columns: &["id", "tenant_id", "name", "diameter", "sort_order", "is_active", "updated_at"],
        mode: PullMode::Upsert,
        renames: &[],
        uses_cursor: true,
        deleted_children: &[],
    },
    EntityPull {
        entity: "pizza_crusts",
        endpoint: "pizza-crusts",
        table: "pizza_crusts",
        columns: &["id", "tenant_id", "name", "price", "is_active", "updated_at"],
        mode: PullMode::Upsert,
        renames: &[],
        uses_cursor: true,
        deleted_children: &[],
    },
    EntityPull {
        entity: "pizza_toppings",
        endpoint: "pizza-toppings",
        table: "pizza_toppings",
        columns: &["id", "tenant_id", "name", "kind", "is_active", "updated_at"],
        mode: PullMode::Upsert,
        renames: &[("toppingType", "kind")],
        uses_cursor: true,
        deleted_children: &[],
    },
    // Pricing tables full-replace every cycle: the cloud returns duplicate
    // ids across syncs, so upserting would leave stale rows behind.
    EntityPull {
        entity: "pizza_topping_prices",
        endpoint: "pizza-topping-prices",
        table: "pizza_topping_prices",
        columns: &["id", "topping_id", "size_id", "price", "updated_at"],
        mode: PullMode::Replace,
        renames: SIZE_ID_RENAMES,
        uses_cursor: false,
        deleted_children: &[],
    },
    EntityPull {
        entity: "pizza_cheese_prices",
        endpoint: "pizza-cheese-prices",
        table: "pizza_cheese_prices",
        columns: &["id", "size_id", "level", "price", "updated_at"],
        mode: PullMode::Replace,
        renames: SIZE_ID_RENAMES,
        uses_cursor: false,
        deleted_children: &[],
    },
    EntityPull {
        entity: "floors",
        endpoint: "floors",
        table: "floors",
        columns: &["id", "tenant_id", "name", "sort_order", "is_active", "updated_at"],
        mode: PullMode::Upsert,
        renames: &[],
        uses_cursor: true,
        deleted_children: &[],
    },
    EntityPull {
        entity: "tables",
        endpoint: "tables",
        table: "tables",
        columns: &["id", "floor_id", "name", "seats", "pos_x", "pos_y", "is_active", "updated_at"],
        mode: PullMode::Upsert,
        renames: &[],
        uses_cursor: true,
        deleted_children: &[],
    },
];

/// Companion column lists for payloads embedded in the product response.
pub const ORDER_TYPE_PRICE_COLUMNS: &[&str] =
    &["id", "product_id", "order_type", "price", "updated_at"];
pub const PIZZA_CONFIG_COLUMNS: &[&str] =
    &["id", "product_id", "max_toppings", "included_count", "updated_at"];

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Referencing entities must come after the entities they reference.
    #[test]
    fn test_plan_is_dependency_ordered() {
        let position: HashMap<&str, usize> = PULL_PLAN
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.entity, i))
            .collect();

        let dependencies = [
            ("products", "categories"),
            ("products", "taxes"),
            ("product_variants", "products"),
            ("modifiers", "modifier_groups"),
            ("deal_items", "deals"),
            ("pizza_topping_prices", "pizza_toppings"),
            ("pizza_topping_prices", "pizza_sizes"),
            ("pizza_cheese_prices", "pizza_sizes"),
            ("tables", "floors"),
        ];

        for (dependent, dependency) in dependencies {
            assert!(
                position[dependency] < position[dependent],
                "{dependency} must be pulled before {dependent}"
            );
        }
    }

    #[test]
    fn test_every_entity_leads_with_id() {
        for entry in PULL_PLAN {
            assert_eq!(entry.columns[0], "id", "{} must key on id", entry.entity);
        }
    }

    #[test]
    fn test_replace_entities_have_no_cursor() {
        for entry in PULL_PLAN {
            if entry.mode == PullMode::Replace {
                assert!(
                    !entry.uses_cursor,
                    "{} full-replaces and must full-fetch",
                    entry.entity
                );
            }
        }
    }
}
