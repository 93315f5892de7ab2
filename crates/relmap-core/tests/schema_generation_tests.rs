#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use relmap_core::model::{
    CascadeAction, FieldDescriptor, PrimitiveType, StorageType, TypeCatalog, TypeDescriptor,
};
use relmap_core::schema::{create_statements, fingerprint};
use relmap_core::{MappingConfig, MappingError, SqliteDialect};

#[test]
fn test_order_tables_and_columns() {
    let schema = order_schema();

    assert_eq!(schema.root_table, "orders");
    assert_eq!(schema.creation_order, vec!["orders", "orders_items"]);
    assert_eq!(
        column_names(&schema, "orders"),
        vec![
            "id",
            "customer_id",
            "total_amount",
            "total_currency",
            "note",
            "discount_amount",
            "discount_currency",
            "placed_at"
        ]
    );
    assert_eq!(
        column_names(&schema, "orders_items"),
        vec![
            "id",
            "order_id",
            "position",
            "product_id",
            "quantity",
            "price_amount",
            "price_currency"
        ]
    );
}

#[test]
fn test_order_column_properties() {
    let schema = order_schema();
    let orders = schema.table("orders").unwrap();

    let id = orders.column("id").unwrap();
    assert!(id.is_primary_key);
    assert_eq!(id.storage_type, StorageType::Guid16);
    assert!(orders.is_root);

    // Nullable value object makes every embedded column nullable
    assert!(orders.column("discount_amount").unwrap().nullable);
    assert!(!orders.column("total_amount").unwrap().nullable);
    assert_eq!(
        orders.column("placed_at").unwrap().storage_type,
        StorageType::TimestampText
    );

    let items = schema.table("orders_items").unwrap();
    assert!(items.synthetic_key);
    assert_eq!(items.foreign_keys.len(), 1);
    let fk = &items.foreign_keys[0];
    assert_eq!(fk.column, "order_id");
    assert_eq!(fk.referenced_table, "orders");
    assert_eq!(fk.referenced_column, "id");
    assert_eq!(fk.cascade_action, CascadeAction::Cascade);
}

#[test]
fn test_library_creation_order_and_ownership() {
    let schema = library_schema();

    assert_eq!(
        schema.creation_order,
        vec![
            "people",
            "libraries",
            "branches",
            "employees",
            "branches_contacts",
            "libraries_ratings",
            "libraries_shelves",
            "libraries_tags"
        ]
    );

    let employees = schema.table("employees").unwrap();
    let own = employees.ownership.as_ref().unwrap();
    assert_eq!(own.owner_table, "branches");
    assert_eq!(own.owner_column, "branch_id");
    assert_eq!(own.order_column.as_deref(), Some("position"));
    assert!(!employees.synthetic_key);
}

#[test]
fn test_cross_aggregate_reference_actions() {
    let schema = library_schema();
    let libraries = schema.table("libraries").unwrap();

    let publisher = libraries
        .foreign_keys
        .iter()
        .find(|fk| fk.column == "publisher_id")
        .unwrap();
    assert_eq!(publisher.referenced_table, "publishers");
    assert_eq!(publisher.cascade_action, CascadeAction::SetNull);

    let manager = libraries
        .foreign_keys
        .iter()
        .find(|fk| fk.column == "manager_id")
        .unwrap();
    assert_eq!(manager.referenced_table, "people");
    assert_eq!(manager.cascade_action, CascadeAction::Cascade);
    assert!(!schema.tables.contains_key("publishers"));
}

#[test]
fn test_collection_unique_constraints() {
    let schema = library_schema();

    let tags = schema.table("libraries_tags").unwrap();
    assert_eq!(tags.unique_constraints, vec![vec!["library_id", "value"]]);

    let ratings = schema.table("libraries_ratings").unwrap();
    assert_eq!(ratings.unique_constraints, vec![vec!["library_id", "map_key"]]);

    let shelves = schema.table("libraries_shelves").unwrap();
    assert_eq!(
        shelves.unique_constraints,
        vec![vec!["library_id", "label", "capacity"]]
    );

    let contacts = schema.table("branches_contacts").unwrap();
    assert!(contacts.column("geo_lat").unwrap().nullable);
    assert!(!contacts.column("street").unwrap().nullable);
}

#[test]
fn test_default_restrict_for_root_reference() {
    let catalog = TypeCatalog::new()
        .with_type(
            TypeDescriptor::new("Invoice")
                .with_field(guid("id"))
                .with_field(FieldDescriptor::reference("customer", "Customer")),
        )
        .with_type(TypeDescriptor::new("Customer").with_field(guid("id")))
        .with_root("Customer");

    let schema = compile(&catalog, "Invoice", &MappingConfig::default()).unwrap();
    let fk = &schema.table("invoices").unwrap().foreign_keys[0];
    assert_eq!(fk.column, "customer_id");
    assert_eq!(fk.cascade_action, CascadeAction::Restrict);
}

#[test]
fn test_set_null_requires_nullable_field() {
    let catalog = TypeCatalog::new()
        .with_type(
            TypeDescriptor::new("Invoice")
                .with_field(guid("id"))
                .with_field(
                    FieldDescriptor::reference("customer", "Customer").on_delete(CascadeAction::SetNull),
                ),
        )
        .with_type(TypeDescriptor::new("Customer").with_field(guid("id")))
        .with_root("Customer");

    let err = compile(&catalog, "Invoice", &MappingConfig::default()).unwrap_err();
    assert!(matches!(err, MappingError::InvalidCascade { .. }));
}

#[test]
fn test_back_edge_is_id_only_column() {
    let catalog = TypeCatalog::new().with_type(
        TypeDescriptor::new("Folder")
            .with_field(guid("id"))
            .with_field(FieldDescriptor::reference("parent", "Folder").nullable())
            .with_field(FieldDescriptor::list("children", "Folder")),
    );

    let schema = compile(&catalog, "Folder", &MappingConfig::default()).unwrap();
    let folders = schema.table("folders").unwrap();
    assert!(folders.column("parent_id").is_some());
    assert!(folders.foreign_keys.is_empty());

    let children = schema.table("folders_children").unwrap();
    assert!(children.column("ref_id").is_some());
    // Only the owner link is enforced
    assert_eq!(children.foreign_keys.len(), 1);
}

#[test]
fn test_value_object_with_collection_rejected() {
    let catalog = TypeCatalog::new()
        .with_type(
            TypeDescriptor::new("Order")
                .with_field(guid("id"))
                .with_field(FieldDescriptor::reference("total", "Money")),
        )
        .with_type(
            TypeDescriptor::new("Money")
                .with_field(FieldDescriptor::list("history", PrimitiveType::Float)),
        );

    let err = compile(&catalog, "Order", &MappingConfig::default()).unwrap_err();
    assert!(matches!(err, MappingError::UnsupportedValueObjectField { .. }));
}

#[test]
fn test_value_object_cycle_rejected() {
    let catalog = TypeCatalog::new()
        .with_type(
            TypeDescriptor::new("Playlist")
                .with_field(guid("id"))
                .with_field(FieldDescriptor::reference("head", "Node")),
        )
        .with_type(
            TypeDescriptor::new("Node")
                .with_field(text("title"))
                .with_field(FieldDescriptor::reference("next", "Node").nullable()),
        );

    let err = compile(&catalog, "Playlist", &MappingConfig::default()).unwrap_err();
    assert_eq!(
        err,
        MappingError::ValueObjectCycle {
            type_name: "Node".to_string(),
            field: "next".to_string(),
        }
    );
}

#[test]
fn test_entity_in_two_collections_is_ambiguous() {
    let catalog = TypeCatalog::new()
        .with_type(
            TypeDescriptor::new("Team")
                .with_field(guid("id"))
                .with_field(FieldDescriptor::list("members", "Player"))
                .with_field(FieldDescriptor::set("captains", "Player")),
        )
        .with_type(TypeDescriptor::new("Player").with_field(guid("id")));

    let err = compile(&catalog, "Team", &MappingConfig::default()).unwrap_err();
    match err {
        MappingError::AmbiguousOwnership { type_name, owners } => {
            assert_eq!(type_name, "Player");
            assert_eq!(owners.len(), 2);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_float_map_key_rejected() {
    let catalog = TypeCatalog::new().with_type(
        TypeDescriptor::new("Chart")
            .with_field(guid("id"))
            .with_field(FieldDescriptor::map("points", PrimitiveType::Float, PrimitiveType::Text)),
    );
    let err = compile(&catalog, "Chart", &MappingConfig::default()).unwrap_err();
    assert!(matches!(err, MappingError::UnsupportedMapKey { .. }));
}

#[test]
fn test_flattened_name_clash_rejected() {
    let catalog = TypeCatalog::new()
        .with_type(
            TypeDescriptor::new("Order")
                .with_field(guid("id"))
                .with_field(FieldDescriptor::primitive("totalAmount", PrimitiveType::Float))
                .with_field(FieldDescriptor::reference("total", "Money")),
        )
        .with_type(
            TypeDescriptor::new("Money")
                .with_field(FieldDescriptor::primitive("amount", PrimitiveType::Float)),
        );

    let err = compile(&catalog, "Order", &MappingConfig::default()).unwrap_err();
    assert_eq!(
        err,
        MappingError::DuplicateColumn {
            table: "orders".to_string(),
            column: "total_amount".to_string(),
        }
    );
}

#[test]
fn test_ddl_shape() {
    let schema = order_schema();
    let statements = create_statements(&schema, &SqliteDialect);

    let orders = &statements[0].sql;
    assert!(orders.starts_with("CREATE TABLE IF NOT EXISTS \"orders\""));
    assert!(orders.contains("\"id\" BLOB NOT NULL"));
    assert!(orders.contains("\"note\" TEXT,") || orders.contains("\"note\" TEXT\n"));
    assert!(orders.contains("PRIMARY KEY (\"id\")"));

    let items = statements
        .iter()
        .find(|s| s.sql.starts_with("CREATE TABLE IF NOT EXISTS \"orders_items\""))
        .unwrap();
    assert!(items
        .sql
        .contains("FOREIGN KEY (\"order_id\") REFERENCES \"orders\" (\"id\") ON DELETE CASCADE"));
    assert!(statements
        .iter()
        .any(|s| s.sql.starts_with("CREATE INDEX IF NOT EXISTS \"idx_orders_items_order_id\"")));
}

#[test]
fn test_fingerprint_is_stable_and_sensitive() {
    let a = fingerprint(&order_schema(), &SqliteDialect);
    let b = fingerprint(&order_schema(), &SqliteDialect);
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);

    let renamed = compile(
        &order_catalog(),
        "Order",
        &MappingConfig::new().with_table_name("Order", "purchase_orders"),
    )
    .unwrap();
    assert_ne!(a, fingerprint(&renamed, &SqliteDialect));
}
