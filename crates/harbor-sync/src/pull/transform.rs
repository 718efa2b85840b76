//! # Pull Transforms
//!
//! Normalizes cloud JSON into store rows: a mechanical camelCase ->
//! snake_case rule, a small per-entity rename map for the quirks (some pizza
//! size fields arrive as either `sizeId` or `pizzaSizeId`), boolean
//! coercion to 0/1, and stringification of nested values destined for TEXT
//! columns. Enumerated per entity - no generic metaprogramming.

use serde_json::{Map, Value};

use harbor_db::ReferenceRow;

/// Converts a camelCase field name to snake_case.
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Normalizes one cloud item into a store row.
///
/// Keys go through the entity's rename map first, then the default
/// camelCase -> snake_case rule. Values are coerced: booleans become 0/1,
/// arrays and objects are stringified for TEXT columns, scalars pass
/// through. Returns `None` when the item is not a JSON object.
pub fn transform_item(item: &Value, renames: &[(&str, &str)]) -> Option<ReferenceRow> {
    let object = item.as_object()?;

    let mut row = Map::with_capacity(object.len());
    for (key, value) in object {
        let column = renames
            .iter()
            .find(|(cloud, _)| cloud == key)
            .map(|(_, column)| column.to_string())
            .unwrap_or_else(|| camel_to_snake(key));

        row.insert(column, coerce(value));
    }

    Some(row)
}

fn coerce(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::from(*b as i64),
        Value::Array(_) | Value::Object(_) => Value::from(value.to_string()),
        other => other.clone(),
    }
}

/// Extracts the item list from a pull response: either `{items: [...]}` or a
/// bare array.
pub fn extract_items(data: &Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items.clone(),
        Value::Object(object) => object
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Extracts the optional `deletedIds` list from a pull response.
pub fn extract_deleted_ids(data: &Value) -> Vec<String> {
    data.get("deletedIds")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Extracts the optional `nextCursor` from a pull response.
pub fn extract_cursor(data: &Value) -> Option<String> {
    data.get("nextCursor")
        .and_then(Value::as_str)
        .map(str::to_string)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(camel_to_snake("categoryId"), "category_id");
        assert_eq!(camel_to_snake("isActive"), "is_active");
        assert_eq!(camel_to_snake("name"), "name");
        assert_eq!(camel_to_snake("posX"), "pos_x");
    }

    #[test]
    fn test_transform_renames_and_coerces() {
        let item = json!({
            "id": "p1",
            "sizeId": "s1",
            "isActive": true,
            "tags": ["a", "b"],
            "price": 9.5
        });

        let row = transform_item(&item, &[("sizeId", "size_id")]).unwrap();

        assert_eq!(row.get("id").unwrap(), "p1");
        assert_eq!(row.get("size_id").unwrap(), "s1");
        assert_eq!(row.get("is_active").unwrap(), &json!(1));
        assert_eq!(row.get("tags").unwrap(), &json!("[\"a\",\"b\"]"));
        assert_eq!(row.get("price").unwrap(), &json!(9.5));
    }

    #[test]
    fn test_rename_variants_land_on_one_column() {
        let renames = &[("sizeId", "size_id"), ("pizzaSizeId", "size_id")];

        let a = transform_item(&json!({"id": "1", "sizeId": "s1"}), renames).unwrap();
        let b = transform_item(&json!({"id": "2", "pizzaSizeId": "s2"}), renames).unwrap();

        assert_eq!(a.get("size_id").unwrap(), "s1");
        assert_eq!(b.get("size_id").unwrap(), "s2");
    }

    #[test]
    fn test_non_object_items_are_rejected() {
        assert!(transform_item(&json!("just a string"), &[]).is_none());
        assert!(transform_item(&json!(42), &[]).is_none());
    }

    #[test]
    fn test_extract_items_both_shapes() {
        let wrapped = json!({"items": [{"id": "a"}], "hasMore": false});
        let bare = json!([{"id": "b"}]);

        assert_eq!(extract_items(&wrapped).len(), 1);
        assert_eq!(extract_items(&bare).len(), 1);
        assert!(extract_items(&json!({"noItems": true})).is_empty());
    }

    #[test]
    fn test_extract_deleted_ids_and_cursor() {
        let data = json!({"items": [], "deletedIds": ["d1", "d2"], "nextCursor": "abc"});

        assert_eq!(extract_deleted_ids(&data), vec!["d1", "d2"]);
        assert_eq!(extract_cursor(&data).as_deref(), Some("abc"));
        assert!(extract_deleted_ids(&json!([])).is_empty());
    }
}
