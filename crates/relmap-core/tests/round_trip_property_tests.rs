#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chrono::{TimeZone, Utc};
use common::library_schema;
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use relmap_core::mapping::{canonicalize, flatten, reconstruct};
use relmap_core::model::NestedGraph;
use relmap_core::SqliteDialect;
use serde_json::{json, Map, Value};
use uuid::Uuid;

fn id(kind: u128, n: u128) -> Value {
    json!(Uuid::from_u128((kind << 64) | n).to_string())
}

fn arb_word() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

fn arb_timestamp() -> impl Strategy<Value = Value> {
    (0i64..4_000_000_000).prop_map(|secs| {
        let ts = Utc.timestamp_opt(secs, 0).single().expect("in range");
        json!(ts.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
    })
}

fn arb_geo() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        (-90.0f64..90.0, -180.0f64..180.0).prop_map(|(lat, lng)| json!({"lat": lat, "lng": lng})),
    ]
}

fn arb_address() -> impl Strategy<Value = Value> {
    (arb_word(), arb_word(), arb_geo())
        .prop_map(|(street, city, geo)| json!({"street": street, "city": city, "geo": geo}))
}

/// Branches with staff; ids are unique across the whole graph
fn arb_branches() -> impl Strategy<Value = Value> {
    vec(
        (
            arb_word(),
            vec((arb_word(), any::<bool>()), 0..3),
            btree_map(arb_word(), arb_address(), 0..3),
        ),
        0..3,
    )
    .prop_map(|branches| {
        let items: Vec<Value> = branches
            .into_iter()
            .enumerate()
            .map(|(b, (code, staff, contacts))| {
                let staff: Vec<Value> = staff
                    .into_iter()
                    .enumerate()
                    .map(|(s, (name, active))| {
                        json!({"id": id(4, (b * 10 + s) as u128), "name": name, "active": active})
                    })
                    .collect();
                let contacts: Map<String, Value> = contacts.into_iter().collect();
                json!({"id": id(3, b as u128), "code": code, "staff": staff, "contacts": contacts})
            })
            .collect();
        Value::Array(items)
    })
}

fn arb_library() -> impl Strategy<Value = NestedGraph> {
    (
        arb_word(),
        prop_oneof![Just(Value::Null), arb_address()],
        prop::option::of((arb_word(), prop::option::of(arb_timestamp()))),
        arb_branches(),
        vec(arb_word(), 0..5),
        vec((arb_word(), any::<i64>()), 0..5),
        vec((prop_oneof![Just("a"), Just("b")], 0i64..3), 0..5),
        any::<bool>(),
    )
        .prop_map(|(name, address, manager, branches, tags, ratings, shelves, has_publisher)| {
            let manager = match manager {
                Some((full_name, born)) => json!({
                    "id": id(2, 1),
                    "fullName": full_name,
                    "born": born.unwrap_or(Value::Null)
                }),
                None => Value::Null,
            };
            let ratings: Vec<Value> = ratings
                .into_iter()
                .map(|(k, v)| json!({"key": k, "value": v}))
                .collect();
            let shelves: Vec<Value> = shelves
                .into_iter()
                .map(|(label, capacity)| json!({"label": label, "capacity": capacity}))
                .collect();
            let publisher = if has_publisher { json!({"id": id(5, 1)}) } else { Value::Null };
            let graph = json!({
                "id": id(1, 1),
                "name": name,
                "address": address,
                "manager": manager,
                "branches": branches,
                "tags": tags,
                "ratings": ratings,
                "shelves": shelves,
                "publisher": publisher
            });
            match graph {
                Value::Object(map) => map,
                _ => unreachable!(),
            }
        })
}

proptest! {
    #[test]
    fn prop_reconstruct_inverts_flatten(graph in arb_library()) {
        let schema = library_schema();
        let rows = flatten(&graph, &schema, &SqliteDialect).unwrap();
        let rebuilt = reconstruct(&rows, &schema.root_table, &schema, &SqliteDialect).unwrap();
        let expected = canonicalize(&graph, &schema, &SqliteDialect).unwrap();
        prop_assert_eq!(rebuilt, expected);
    }

    #[test]
    fn prop_canonical_form_is_a_fixed_point(graph in arb_library()) {
        let schema = library_schema();
        let once = canonicalize(&graph, &schema, &SqliteDialect).unwrap();
        let twice = canonicalize(&once, &schema, &SqliteDialect).unwrap();
        prop_assert_eq!(once, twice);
    }
}
