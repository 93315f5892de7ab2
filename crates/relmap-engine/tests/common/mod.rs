#![allow(dead_code)]

use std::sync::Arc;

use relmap_core::connection::{Connection, Session};
use relmap_core::errors::{ExError, ExErrorKind, ExResult};
use relmap_core::model::{Row, Statement};
use relmap_core::{NestedGraph, RelationalMapper, SqliteDialect};
use relmap_engine::TransactionalExecutor;
use relmap_store::{parse_catalog_str, SqliteConnection};
use serde_json::{json, Value};

pub const CATALOG: &str = r#"
schema_version: 0
aggregates: [Order, Shipment, Team]
types:
  - name: Order
    fields:
      - { name: id, type: guid }
      - { name: customerId, type: guid }
      - { name: total, type: Money }
      - { name: items, list: Item }
      - { name: note, type: text, nullable: true }
      - { name: discount, type: Money, nullable: true }
      - { name: tags, set: text }
      - { name: attributes, map: text }
      - { name: placedAt, type: timestamp }
  - name: Item
    fields:
      - { name: productId, type: guid }
      - { name: quantity, type: integer }
      - { name: price, type: Money }
  - name: Money
    fields:
      - { name: amount, type: float }
      - { name: currency, type: text }
  - name: Shipment
    fields:
      - { name: id, type: guid }
      - { name: order, type: Order }
      - { name: carrier, type: text }
  - name: Team
    fields:
      - { name: id, type: guid }
      - { name: name, type: text }
      - { name: coach, type: Person, nullable: true }
      - { name: members, list: Member }
      - { name: scores, set: float }
  - name: Person
    fields:
      - { name: id, type: guid }
      - { name: fullName, type: text }
  - name: Member
    fields:
      - { name: id, type: guid }
      - { name: nickname, type: text }
"#;

pub const ORDER_ID: &str = "0b6f4a52-33b6-4c0e-9d59-6c2b1d0c9a10";
pub const CUSTOMER_ID: &str = "5e1f8c6a-2b0d-4f43-8f6e-91a7a3c2d7e4";
pub const PRODUCT_A: &str = "11111111-1111-4111-8111-111111111111";
pub const PRODUCT_B: &str = "22222222-2222-4222-8222-222222222222";
pub const SHIPMENT_ID: &str = "33333333-3333-4333-8333-333333333333";
pub const TEAM_ID: &str = "44444444-4444-4444-8444-444444444444";
pub const COACH_ID: &str = "55555555-5555-4555-8555-555555555555";
pub const SECOND_COACH_ID: &str = "88888888-8888-4888-8888-888888888888";

pub fn executor() -> TransactionalExecutor {
    let catalog = parse_catalog_str(CATALOG).expect("catalog");
    TransactionalExecutor::from_catalog(catalog, Arc::new(SqliteDialect))
}

/// In-memory database with every aggregate's schema applied
pub fn setup() -> (TransactionalExecutor, SqliteConnection) {
    let executor = executor();
    let mut conn = SqliteConnection::open_in_memory().expect("open");
    for root in ["Order", "Shipment", "Team"] {
        executor.create_schema(&mut conn, root).expect("schema");
    }
    (executor, conn)
}

pub fn graph(value: Value) -> NestedGraph {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

pub fn order_graph() -> NestedGraph {
    graph(json!({
        "id": ORDER_ID,
        "customerId": CUSTOMER_ID,
        "total": {"amount": 25.5, "currency": "EUR"},
        "items": [
            {"productId": PRODUCT_A, "quantity": 2, "price": {"amount": 10.0, "currency": "EUR"}},
            {"productId": PRODUCT_B, "quantity": 1, "price": {"amount": 5.5, "currency": "EUR"}}
        ],
        "note": null,
        "discount": null,
        "tags": [],
        "attributes": {},
        "placedAt": "2024-05-01T12:00:00Z"
    }))
}

pub fn canonical(executor: &TransactionalExecutor, root: &str, graph: &NestedGraph) -> NestedGraph {
    let mapping = executor.registry().mapping(root).expect("mapping");
    RelationalMapper::new(&mapping.schema, &SqliteDialect)
        .canonicalize(graph)
        .expect("canonical")
}

pub fn count(conn: &SqliteConnection, table: &str) -> i64 {
    conn.raw()
        .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |r| r.get(0))
        .expect("count")
}

/// Connection whose sessions fail the first statement containing `pattern`
pub struct FailingConnection<'a> {
    pub inner: &'a mut SqliteConnection,
    pub pattern: &'static str,
}

struct FailingSession<'s> {
    inner: &'s dyn Session,
    pattern: &'static str,
}

impl Session for FailingSession<'_> {
    fn execute(&self, statement: &Statement) -> ExResult<usize> {
        if statement.sql.contains(self.pattern) {
            return Err(ExError::new(ExErrorKind::ConnectionFailure).with_message("injected failure"));
        }
        self.inner.execute(statement)
    }

    fn query(&self, statement: &Statement) -> ExResult<Vec<Row>> {
        self.inner.query(statement)
    }
}

impl Connection for FailingConnection<'_> {
    fn transaction<T, F>(&mut self, work: F) -> ExResult<T>
    where
        F: FnOnce(&dyn Session) -> ExResult<T>,
    {
        let pattern = self.pattern;
        self.inner.transaction(|session| {
            let failing = FailingSession {
                inner: session,
                pattern,
            };
            work(&failing)
        })
    }
}
