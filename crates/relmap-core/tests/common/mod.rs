#![allow(dead_code)]

use relmap_core::model::{
    CascadeAction, FieldDescriptor, PrimitiveType, TypeCatalog, TypeDescriptor,
};
use relmap_core::{analyze, classify, schema, MappingConfig, Schema};

pub fn guid(field: &str) -> FieldDescriptor {
    FieldDescriptor::primitive(field, PrimitiveType::Guid)
}

pub fn text(field: &str) -> FieldDescriptor {
    FieldDescriptor::primitive(field, PrimitiveType::Text)
}

/// Order{id, customerId, total: Money, items: List<Item>, note?, discount?: Money, placedAt}
pub fn order_catalog() -> TypeCatalog {
    TypeCatalog::new()
        .with_type(
            TypeDescriptor::new("Order")
                .with_field(guid("id"))
                .with_field(guid("customerId"))
                .with_field(FieldDescriptor::reference("total", "Money"))
                .with_field(FieldDescriptor::list("items", "Item"))
                .with_field(text("note").nullable())
                .with_field(FieldDescriptor::reference("discount", "Money").nullable())
                .with_field(FieldDescriptor::primitive("placedAt", PrimitiveType::Timestamp)),
        )
        .with_type(
            TypeDescriptor::new("Item")
                .with_field(guid("productId"))
                .with_field(FieldDescriptor::primitive("quantity", PrimitiveType::Integer))
                .with_field(FieldDescriptor::reference("price", "Money")),
        )
        .with_type(
            TypeDescriptor::new("Money")
                .with_field(FieldDescriptor::primitive("amount", PrimitiveType::Float))
                .with_field(text("currency")),
        )
        .with_root("Order")
}

/// Library aggregate exercising every binding kind
pub fn library_catalog() -> TypeCatalog {
    TypeCatalog::new()
        .with_type(
            TypeDescriptor::new("Library")
                .with_field(guid("id"))
                .with_field(text("name"))
                .with_field(FieldDescriptor::reference("address", "Address").nullable())
                .with_field(FieldDescriptor::reference("manager", "Person").nullable())
                .with_field(FieldDescriptor::list("branches", "Branch"))
                .with_field(FieldDescriptor::set("tags", PrimitiveType::Text))
                .with_field(FieldDescriptor::map("ratings", PrimitiveType::Text, PrimitiveType::Integer))
                .with_field(FieldDescriptor::set("shelves", "Shelf"))
                .with_field(
                    FieldDescriptor::reference("publisher", "Publisher")
                        .nullable()
                        .on_delete(CascadeAction::SetNull),
                ),
        )
        .with_type(
            TypeDescriptor::new("Address")
                .with_field(text("street"))
                .with_field(text("city"))
                .with_field(FieldDescriptor::reference("geo", "Geo").nullable()),
        )
        .with_type(
            TypeDescriptor::new("Geo")
                .with_field(FieldDescriptor::primitive("lat", PrimitiveType::Float))
                .with_field(FieldDescriptor::primitive("lng", PrimitiveType::Float)),
        )
        .with_type(
            TypeDescriptor::new("Person")
                .with_field(guid("id"))
                .with_field(text("fullName"))
                .with_field(FieldDescriptor::primitive("born", PrimitiveType::Timestamp).nullable()),
        )
        .with_type(
            TypeDescriptor::new("Branch")
                .with_field(guid("id"))
                .with_field(text("code"))
                .with_field(FieldDescriptor::list("staff", "Employee"))
                .with_field(FieldDescriptor::map("contacts", PrimitiveType::Text, "Address")),
        )
        .with_type(
            TypeDescriptor::new("Employee")
                .with_field(guid("id"))
                .with_field(text("name"))
                .with_field(FieldDescriptor::primitive("active", PrimitiveType::Boolean)),
        )
        .with_type(
            TypeDescriptor::new("Shelf")
                .with_field(text("label"))
                .with_field(FieldDescriptor::primitive("capacity", PrimitiveType::Integer)),
        )
        .with_type(
            TypeDescriptor::new("Publisher")
                .with_field(guid("id"))
                .with_field(text("name")),
        )
        .with_root("Library")
        .with_root("Publisher")
}

pub fn library_config() -> MappingConfig {
    MappingConfig::new().with_table_name("Person", "people")
}

/// Analyse, classify and generate in one go
pub fn compile(catalog: &TypeCatalog, root: &str, config: &MappingConfig) -> relmap_core::Result<Schema> {
    let mut roots = catalog.roots().clone();
    roots.insert(root.to_string());
    let analysis = analyze(root, catalog, &roots)?;
    let roles = classify(&analysis.types, root, &analysis.external_roots)?;
    schema::generate(&analysis, &roles, &|t| config.table_name_for(t))
}

pub fn order_schema() -> Schema {
    compile(&order_catalog(), "Order", &MappingConfig::default()).expect("order schema")
}

pub fn library_schema() -> Schema {
    compile(&library_catalog(), "Library", &library_config()).expect("library schema")
}

pub fn column_names(schema: &Schema, table: &str) -> Vec<String> {
    schema
        .table(table)
        .expect("table")
        .columns
        .iter()
        .map(|c| c.name.clone())
        .collect()
}
