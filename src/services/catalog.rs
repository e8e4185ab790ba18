use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Service, ServiceCategory};

/// Columns every category may update. Identity, category, and timestamps are
/// fixed at creation.
const BASE_UPDATABLE: &[&str] = &[
    "title",
    "description",
    "price",
    "currency",
    "location",
    "image_url",
    "is_active",
];

#[derive(Debug)]
pub enum CatalogError {
    Storage(anyhow::Error),
    NotOwner,
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Storage(e) => write!(f, "{e}"),
            CatalogError::NotOwner => write!(f, "service does not belong to this vendor"),
        }
    }
}

impl From<anyhow::Error> for CatalogError {
    fn from(e: anyhow::Error) -> Self {
        CatalogError::Storage(e)
    }
}

fn to_sql_value(value: &serde_json::Value) -> Option<rusqlite::types::Value> {
    match value {
        serde_json::Value::Null => Some(rusqlite::types::Value::Null),
        serde_json::Value::Bool(b) => Some(rusqlite::types::Value::Integer(*b as i64)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(rusqlite::types::Value::Integer(i))
            } else {
                n.as_f64().map(rusqlite::types::Value::Real)
            }
        }
        serde_json::Value::String(s) => Some(rusqlite::types::Value::Text(s.clone())),
        // Arrays and objects have no column representation.
        _ => None,
    }
}

/// Filter a partial-update payload down to the columns this category may
/// touch. Keys outside the whitelist, and values with no scalar column
/// representation, are dropped without error.
pub fn build_service_update(
    category: &ServiceCategory,
    payload: &serde_json::Map<String, serde_json::Value>,
) -> Vec<(String, rusqlite::types::Value)> {
    let attrs = category.attribute_columns();

    let mut assignments = vec![];
    for (key, value) in payload {
        let allowed = BASE_UPDATABLE.contains(&key.as_str()) || attrs.contains(&key.as_str());
        if !allowed {
            continue;
        }
        if let Some(sql_value) = to_sql_value(value) {
            assignments.push((key.clone(), sql_value));
        }
    }
    assignments
}

/// Apply a whitelisted partial update to a vendor's own service and return
/// the refreshed row. `updated_at` is bumped even when every key in the
/// payload was dropped.
pub fn update_service(
    conn: &Connection,
    vendor_id: &str,
    service_id: &str,
    payload: &serde_json::Map<String, serde_json::Value>,
) -> Result<Option<Service>, CatalogError> {
    let Some(service) = queries::get_service(conn, service_id)? else {
        return Ok(None);
    };
    if service.vendor_id != vendor_id {
        return Err(CatalogError::NotOwner);
    }

    let assignments = build_service_update(&service.category, payload);
    queries::update_service_columns(conn, service_id, &assignments)?;

    Ok(queries::get_service(conn, service_id)?)
}

/// Take a vendor's own service off the catalog.
pub fn deactivate_service(
    conn: &Connection,
    vendor_id: &str,
    service_id: &str,
) -> Result<Option<Service>, CatalogError> {
    let Some(service) = queries::get_service(conn, service_id)? else {
        return Ok(None);
    };
    if service.vendor_id != vendor_id {
        return Err(CatalogError::NotOwner);
    }

    queries::set_service_active(conn, service_id, false)?;
    Ok(queries::get_service(conn, service_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::testutil;
    use serde_json::json;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn insert_service(conn: &Connection, id: &str, vendor_id: &str, category: &str) {
        // Foreign keys are on, so the owning vendor has to exist first.
        testutil::seed_vendor(conn, vendor_id);
        conn.execute(
            "INSERT INTO services (id, vendor_id, title, description, category, price, \
             currency, location, is_active, created_at, updated_at)
             VALUES (?1, ?2, 'Gorilla trek', 'Two days in Bwindi', ?3, 250000, 'UGX', \
             'Bwindi', 1, '2026-01-01 08:00:00', '2026-01-01 08:00:00')",
            rusqlite::params![id, vendor_id, category],
        )
        .unwrap();
    }

    fn payload(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_unknown_keys_dropped_valid_keys_kept() {
        let conn = setup_db();
        insert_service(&conn, "s1", "v1", "tour");

        let updated = update_service(
            &conn,
            "v1",
            "s1",
            &payload(json!({
                "title": "Chimp trek",
                "vendor_id": "someone-else",
                "star_rating": 5,
                "bogus_column": "x"
            })),
        )
        .unwrap()
        .unwrap();

        // title is whitelisted; star_rating belongs to hotels, vendor_id and
        // bogus_column to nobody.
        assert_eq!(updated.title, "Chimp trek");
        assert_eq!(updated.vendor_id, "v1");
        assert_eq!(updated.star_rating, None);
    }

    #[test]
    fn test_update_refreshes_updated_at() {
        let conn = setup_db();
        insert_service(&conn, "s1", "v1", "tour");
        let before = queries::get_service(&conn, "s1").unwrap().unwrap();

        let updated = update_service(&conn, "v1", "s1", &payload(json!({"nope": 1})))
            .unwrap()
            .unwrap();

        assert!(updated.updated_at > before.updated_at);
    }

    #[test]
    fn test_category_attributes_accepted_for_matching_category() {
        let conn = setup_db();
        insert_service(&conn, "s1", "v1", "hotel");

        let updated = update_service(
            &conn,
            "v1",
            "s1",
            &payload(json!({"star_rating": 4, "room_type": "double"})),
        )
        .unwrap()
        .unwrap();

        assert_eq!(updated.star_rating, Some(4));
        assert_eq!(updated.room_type.as_deref(), Some("double"));
    }

    #[test]
    fn test_update_rejects_foreign_vendor() {
        let conn = setup_db();
        insert_service(&conn, "s1", "v1", "tour");

        let err = update_service(&conn, "v2", "s1", &payload(json!({"title": "Mine now"})))
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotOwner));

        let service = queries::get_service(&conn, "s1").unwrap().unwrap();
        assert_eq!(service.title, "Gorilla trek");
    }

    #[test]
    fn test_non_scalar_values_dropped() {
        let assignments = build_service_update(
            &ServiceCategory::Tour,
            &payload(json!({"title": ["not", "a", "string"], "price": 9000})),
        );
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].0, "price");
    }

    #[test]
    fn test_deactivate_own_service() {
        let conn = setup_db();
        insert_service(&conn, "s1", "v1", "tour");

        let service = deactivate_service(&conn, "v1", "s1").unwrap().unwrap();
        assert!(!service.is_active);
    }
}
