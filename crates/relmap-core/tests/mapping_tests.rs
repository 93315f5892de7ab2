#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use relmap_core::mapping::{canonicalize, flatten, reconstruct};
use relmap_core::errors::{ExError, ExErrorKind};
use relmap_core::model::{NestedGraph, SqlValue};
use relmap_core::{MappingError, SqliteDialect};
use serde_json::{json, Value};

const ORDER_ID: &str = "0b6f4a52-33b6-4c0e-9d59-6c2b1d0c9a10";
const CUSTOMER_ID: &str = "5e1f8c6a-2b0d-4f43-8f6e-91a7a3c2d7e4";

fn graph(value: Value) -> NestedGraph {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

fn order_graph() -> NestedGraph {
    graph(json!({
        "id": ORDER_ID,
        "customerId": CUSTOMER_ID,
        "total": {"amount": 30.5, "currency": "EUR"},
        "items": [
            {
                "productId": "11111111-1111-4111-8111-111111111111",
                "quantity": 2,
                "price": {"amount": 10.0, "currency": "EUR"}
            },
            {
                "productId": "22222222-2222-4222-8222-222222222222",
                "quantity": 1,
                "price": {"amount": 10.5, "currency": "EUR"}
            }
        ],
        "note": null,
        "discount": null,
        "placedAt": "2024-05-01T12:00:00Z"
    }))
}

#[test]
fn test_order_flattens_into_expected_rows() {
    let schema = order_schema();
    let rows = flatten(&order_graph(), &schema, &SqliteDialect).unwrap();

    let orders = rows.rows("orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["total_amount"], SqlValue::Real(30.5));
    assert_eq!(orders[0]["total_currency"], SqlValue::Text("EUR".into()));
    assert_eq!(orders[0]["discount_amount"], SqlValue::Null);
    assert_eq!(orders[0]["discount_currency"], SqlValue::Null);

    let items = rows.rows("orders_items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["position"], SqlValue::Integer(0));
    assert_eq!(items[1]["position"], SqlValue::Integer(1));
    assert_eq!(items[0]["order_id"], orders[0]["id"]);
    assert_eq!(items[1]["price_amount"], SqlValue::Real(10.5));
    assert_ne!(items[0]["id"], items[1]["id"]);
}

#[test]
fn test_order_round_trip() {
    let schema = order_schema();
    let original = order_graph();
    let rows = flatten(&original, &schema, &SqliteDialect).unwrap();
    let rebuilt = reconstruct(&rows, "orders", &schema, &SqliteDialect).unwrap();

    assert_eq!(rebuilt, canonicalize(&original, &schema, &SqliteDialect).unwrap());
    assert_eq!(rebuilt["discount"], Value::Null);
    assert_eq!(rebuilt["items"][0]["price"]["amount"], json!(10.0));
    assert_eq!(rebuilt["items"][1]["quantity"], json!(1));
    // Synthetic keys stay internal
    assert!(rebuilt["items"][0].get("id").is_none());
}

#[test]
fn test_list_order_follows_position_not_row_order() {
    let schema = order_schema();
    let mut rows = flatten(&order_graph(), &schema, &SqliteDialect).unwrap();
    let mut reversed = relmap_core::RowSet::new();
    for (table, table_rows) in rows.tables() {
        reversed.extend(table, table_rows.iter().rev().cloned());
    }
    rows = reversed;

    let rebuilt = reconstruct(&rows, "orders", &schema, &SqliteDialect).unwrap();
    assert_eq!(
        rebuilt["items"][0]["productId"],
        json!("11111111-1111-4111-8111-111111111111")
    );
}

#[test]
fn test_missing_required_field() {
    let schema = order_schema();
    let mut broken = order_graph();
    broken.remove("total");

    let err = flatten(&broken, &schema, &SqliteDialect).unwrap_err();
    assert_eq!(
        err,
        MappingError::MissingField {
            table: "orders".to_string(),
            field: "total".to_string(),
        }
    );
}

#[test]
fn test_wrong_leaf_type() {
    let schema = order_schema();
    let mut broken = order_graph();
    broken.insert("placedAt".to_string(), json!("last tuesday"));
    let err = flatten(&broken, &schema, &SqliteDialect).unwrap_err();
    assert!(matches!(err, MappingError::InvalidTimestamp { .. }));

    let mut broken = order_graph();
    broken.insert("items".to_string(), json!({"not": "a list"}));
    let err = flatten(&broken, &schema, &SqliteDialect).unwrap_err();
    assert!(matches!(err, MappingError::UnexpectedShape { expected: "array", .. }));
}

fn library_graph() -> NestedGraph {
    graph(json!({
        "id": "aaaaaaaa-0000-4000-8000-000000000001",
        "name": "Central",
        "address": {"street": "Main St 1", "city": "Springfield", "geo": null},
        "manager": {
            "id": "bbbbbbbb-0000-4000-8000-000000000001",
            "fullName": "Ada",
            "born": "1815-12-10T00:00:00Z"
        },
        "branches": [
            {
                "id": "cccccccc-0000-4000-8000-000000000001",
                "code": "N",
                "staff": [
                    {"id": "dddddddd-0000-4000-8000-000000000001", "name": "Bo", "active": true},
                    {"id": "dddddddd-0000-4000-8000-000000000002", "name": "Cy", "active": false}
                ],
                "contacts": {
                    "front": {"street": "North 2", "city": "Springfield", "geo": {"lat": 1.5, "lng": 2.5}}
                }
            }
        ],
        "tags": ["history", "maps", "history"],
        "ratings": [
            {"key": "kids", "value": 3},
            {"key": "adults", "value": 4},
            {"key": "kids", "value": 5}
        ],
        "shelves": [
            {"label": "A", "capacity": 10},
            {"label": "A", "capacity": 10},
            {"label": "B", "capacity": 12}
        ],
        "publisher": {"id": "eeeeeeee-0000-4000-8000-000000000001", "name": "ignored"}
    }))
}

#[test]
fn test_set_drops_duplicates_and_map_keeps_last() {
    let schema = library_schema();
    let rows = flatten(&library_graph(), &schema, &SqliteDialect).unwrap();

    assert_eq!(rows.rows("libraries_tags").len(), 2);
    assert_eq!(rows.rows("libraries_shelves").len(), 2);
    assert_eq!(rows.rows("libraries_ratings").len(), 2);

    let rebuilt = reconstruct(&rows, "libraries", &schema, &SqliteDialect).unwrap();
    assert_eq!(rebuilt["tags"], json!(["history", "maps"]));
    assert_eq!(rebuilt["ratings"], json!({"adults": 4, "kids": 5}));
}

#[test]
fn test_list_rejects_repeated_entity() {
    let schema = library_schema();
    let mut library = library_graph();
    library["branches"][0]["staff"] = json!([
        {"id": "dddddddd-0000-4000-8000-000000000001", "name": "Bo", "active": true},
        {"id": "DDDDDDDD-0000-4000-8000-000000000001", "name": "Bo again", "active": false}
    ]);

    let err = flatten(&library, &schema, &SqliteDialect).unwrap_err();
    assert!(matches!(err, MappingError::RepeatedEntity { .. }), "got {:?}", err);
    assert_eq!(ExError::from(err).kind(), ExErrorKind::InvalidGraph);
}

#[test]
fn test_library_round_trip() {
    let schema = library_schema();
    let original = library_graph();
    let rows = flatten(&original, &schema, &SqliteDialect).unwrap();
    let rebuilt = reconstruct(&rows, "libraries", &schema, &SqliteDialect).unwrap();

    assert_eq!(rebuilt, canonicalize(&original, &schema, &SqliteDialect).unwrap());
    assert_eq!(rebuilt["manager"]["fullName"], json!("Ada"));
    assert_eq!(rebuilt["branches"][0]["staff"][1]["active"], json!(false));
    assert_eq!(
        rebuilt["branches"][0]["contacts"]["front"]["geo"],
        json!({"lat": 1.5, "lng": 2.5})
    );
    // Cross-aggregate references come back as id stubs
    assert_eq!(
        rebuilt["publisher"],
        json!({"id": "eeeeeeee-0000-4000-8000-000000000001"})
    );
    assert_eq!(rebuilt["address"]["geo"], Value::Null);
}

#[test]
fn test_null_value_object_round_trips_as_null() {
    let schema = library_schema();
    let mut original = library_graph();
    original.insert("address".to_string(), Value::Null);
    original.insert("manager".to_string(), Value::Null);

    let rows = flatten(&original, &schema, &SqliteDialect).unwrap();
    let library = &rows.rows("libraries")[0];
    for column in ["address_street", "address_city", "address_geo_lat", "address_geo_lng"] {
        assert_eq!(library[column], SqlValue::Null, "{} should be NULL", column);
    }
    assert!(rows.rows("people").is_empty());

    let rebuilt = reconstruct(&rows, "libraries", &schema, &SqliteDialect).unwrap();
    assert_eq!(rebuilt["address"], Value::Null);
    assert_eq!(rebuilt["manager"], Value::Null);
}

#[test]
fn test_reconstruct_requires_single_root_row() {
    let schema = order_schema();
    let empty = relmap_core::RowSet::new();
    let err = reconstruct(&empty, "orders", &schema, &SqliteDialect).unwrap_err();
    assert!(matches!(err, MappingError::MissingRootRow { .. }));

    let rows = flatten(&order_graph(), &schema, &SqliteDialect).unwrap();
    let mut doubled = rows.clone();
    doubled.extend("orders", rows.rows("orders").to_vec());
    let err = reconstruct(&doubled, "orders", &schema, &SqliteDialect).unwrap_err();
    assert!(matches!(err, MappingError::MultipleRootRows { count: 2, .. }));
}

#[test]
fn test_dangling_entity_reference() {
    let schema = library_schema();
    let rows = flatten(&library_graph(), &schema, &SqliteDialect).unwrap();
    let mut without_people = relmap_core::RowSet::new();
    for (table, table_rows) in rows.tables() {
        if table != "people" {
            without_people.extend(table, table_rows.to_vec());
        }
    }
    let err = reconstruct(&without_people, "libraries", &schema, &SqliteDialect).unwrap_err();
    assert_eq!(
        err,
        MappingError::DanglingReference {
            table: "libraries".to_string(),
            column: "manager_id".to_string(),
        }
    );
}

#[test]
fn test_guid_case_is_normalized() {
    let schema = order_schema();
    let mut original = order_graph();
    original.insert("id".to_string(), json!(ORDER_ID.to_uppercase()));
    let rows = flatten(&original, &schema, &SqliteDialect).unwrap();
    let rebuilt = reconstruct(&rows, "orders", &schema, &SqliteDialect).unwrap();
    assert_eq!(rebuilt["id"], json!(ORDER_ID));
}
