use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::{codec, column_def, identity_field, leaf_bindings, ownership, shape_of, stub_id};
use crate::dialect::Dialect;
use crate::errors::{MappingError, Result};
use crate::model::{
    CollectionKind, ElementShape, FieldBinding, NestedGraph, ReferenceTarget, Row, RowSet,
    SqlValue, TableDefinition,
};
use crate::schema::Schema;

/// Owner key and ordering value carried by a collection row
struct ParentLink<'l> {
    owner_column: &'l str,
    owner_key: &'l SqlValue,
    order: Option<(&'l str, SqlValue)>,
}

struct Flattener<'a> {
    schema: &'a Schema,
    dialect: &'a dyn Dialect,
    rows: RowSet,
}

impl<'a> Flattener<'a> {
    fn new_row(&self, table: &TableDefinition, link: Option<&ParentLink<'_>>) -> Result<Row> {
        let mut row = Row::new();
        if table.synthetic_key {
            let key = self.dialect.encode_guid(&Uuid::new_v4().to_string())?;
            row.insert(table.primary_key.clone(), key);
        }
        if let Some(link) = link {
            row.insert(link.owner_column.to_string(), link.owner_key.clone());
            if let Some((column, value)) = &link.order {
                row.insert(column.to_string(), value.clone());
            }
        }
        Ok(row)
    }

    /// One root or entity row plus everything it owns; returns its key
    fn record(
        &mut self,
        table: &TableDefinition,
        obj: &NestedGraph,
        link: Option<&ParentLink<'_>>,
    ) -> Result<SqlValue> {
        let mut row = self.new_row(table, link)?;
        self.bind(table, &table.bindings, obj, &mut row)?;
        let key = row.get(&table.primary_key).cloned().unwrap_or(SqlValue::Null);

        let schema = self.schema;
        for binding in &table.bindings {
            if let FieldBinding::Collection { field, table: child } = binding {
                let child = schema.table(child)?;
                let value = obj.get(field).unwrap_or(&Value::Null);
                self.collection(table, field, child, value, &key)?;
            }
        }

        self.rows.push(table.table_name.clone(), row);
        Ok(key)
    }

    /// Scalar, embedded and reference bindings of one record
    fn bind(
        &mut self,
        table: &TableDefinition,
        bindings: &[FieldBinding],
        obj: &NestedGraph,
        row: &mut Row,
    ) -> Result<()> {
        for binding in bindings {
            match binding {
                FieldBinding::Column {
                    field,
                    column,
                    nullable,
                } => {
                    let value = obj.get(field).unwrap_or(&Value::Null);
                    if value.is_null() && !nullable {
                        return Err(missing(table, field));
                    }
                    let encoded = codec::encode(value, column_def(table, column)?, self.dialect)?;
                    row.insert(column.clone(), encoded);
                }
                FieldBinding::Embedded {
                    field,
                    nullable,
                    bindings,
                } => match obj.get(field).unwrap_or(&Value::Null) {
                    Value::Null if *nullable => null_columns(bindings, row),
                    Value::Null => return Err(missing(table, field)),
                    Value::Object(inner) => self.bind(table, bindings, inner, row)?,
                    other => return Err(unexpected(table, field, "object", other)),
                },
                FieldBinding::Reference {
                    field,
                    column,
                    nullable,
                    target,
                } => {
                    let value = obj.get(field).unwrap_or(&Value::Null);
                    let encoded = match (target, value) {
                        (_, Value::Null) if *nullable => SqlValue::Null,
                        (_, Value::Null) => return Err(missing(table, field)),
                        (ReferenceTarget::Entity { table: target }, Value::Object(inner)) => {
                            let schema = self.schema;
                            self.record(schema.table(target)?, inner, None)?
                        }
                        (ReferenceTarget::Entity { .. }, other) => {
                            return Err(unexpected(table, field, "object", other));
                        }
                        (ReferenceTarget::Aggregate { key_field, .. }, value)
                        | (ReferenceTarget::Stub { key_field }, value) => {
                            let id = stub_id(value, key_field);
                            if id.is_null() {
                                return Err(missing(table, field));
                            }
                            codec::encode(id, column_def(table, column)?, self.dialect)?
                        }
                    };
                    row.insert(column.clone(), encoded);
                }
                FieldBinding::Collection { .. } => {}
            }
        }
        Ok(())
    }

    fn collection(
        &mut self,
        owner: &TableDefinition,
        field: &str,
        child: &TableDefinition,
        value: &Value,
        owner_key: &SqlValue,
    ) -> Result<()> {
        let own = ownership(child)?;

        match own.collection {
            CollectionKind::List => {
                let position = own.order_column.as_deref().unwrap_or("position");
                let mut seen = BTreeSet::new();
                for (i, element) in as_elements(owner, field, value)?.iter().enumerate() {
                    self.claim_entity(child, element, &mut seen)?;
                    let link = ParentLink {
                        owner_column: &own.owner_column,
                        owner_key,
                        order: Some((position, SqlValue::Integer(i as i64))),
                    };
                    self.element(child, element, &link)?;
                }
            }
            CollectionKind::Set => {
                let link = ParentLink {
                    owner_column: &own.owner_column,
                    owner_key,
                    order: None,
                };
                let mut seen = BTreeSet::new();
                for element in as_elements(owner, field, value)? {
                    if child.is_record_table() {
                        let key = self.entity_key(child, element)?;
                        if seen.insert(key) {
                            self.element(child, element, &link)?;
                        }
                    } else {
                        let row = self.element_row(child, element, &link)?;
                        if seen.insert(content_key(child, &row, own.owner_column.as_str())) {
                            self.rows.push(child.table_name.clone(), row);
                        }
                    }
                }
            }
            CollectionKind::Map => {
                let key_column_name = own.order_column.as_deref().unwrap_or("map_key");
                let key_column = column_def(child, key_column_name)?;
                let mut entries: Vec<(SqlValue, &Value)> = Vec::new();
                let mut slots: BTreeMap<String, usize> = BTreeMap::new();
                for (key, element) in map_entries(owner, field, value)? {
                    let encoded = codec::encode_key(&key, key_column, self.dialect)?;
                    match slots.get(&encoded.key_text()) {
                        Some(&slot) => entries[slot].1 = element,
                        None => {
                            slots.insert(encoded.key_text(), entries.len());
                            entries.push((encoded, element));
                        }
                    }
                }
                let mut seen = BTreeSet::new();
                for (key, element) in entries {
                    self.claim_entity(child, element, &mut seen)?;
                    let link = ParentLink {
                        owner_column: &own.owner_column,
                        owner_key,
                        order: Some((key_column_name, key)),
                    };
                    self.element(child, element, &link)?;
                }
            }
        }
        Ok(())
    }

    fn element(&mut self, child: &TableDefinition, element: &Value, link: &ParentLink<'_>) -> Result<()> {
        if child.is_record_table() {
            return match element {
                Value::Object(obj) => self.record(child, obj, Some(link)).map(|_| ()),
                other => Err(unexpected(child, &child.owner_type, "object", other)),
            };
        }
        let row = self.element_row(child, element, link)?;
        self.rows.push(child.table_name.clone(), row);
        Ok(())
    }

    /// Row for a value-object, primitive or reference element
    fn element_row(&mut self, child: &TableDefinition, element: &Value, link: &ParentLink<'_>) -> Result<Row> {
        let mut row = self.new_row(child, Some(link))?;
        match &child.element {
            ElementShape::Record => match element {
                Value::Object(obj) => self.bind(child, &child.bindings, obj, &mut row)?,
                other => return Err(unexpected(child, &child.owner_type, "object", other)),
            },
            ElementShape::Scalar { column } => {
                if element.is_null() {
                    return Err(missing(child, column));
                }
                let encoded = codec::encode(element, column_def(child, column)?, self.dialect)?;
                row.insert(column.clone(), encoded);
            }
            ElementShape::Stub { column, key_field } => {
                let id = stub_id(element, key_field);
                if id.is_null() {
                    return Err(missing(child, column));
                }
                let encoded = codec::encode(id, column_def(child, column)?, self.dialect)?;
                row.insert(column.clone(), encoded);
            }
        }
        Ok(row)
    }

    /// Entity rows hold one position or map key, so an id may occur once
    fn claim_entity(&self, child: &TableDefinition, element: &Value, seen: &mut BTreeSet<String>) -> Result<()> {
        if !child.is_record_table() {
            return Ok(());
        }
        let key = self.entity_key(child, element)?;
        if seen.insert(key.clone()) {
            Ok(())
        } else {
            Err(MappingError::RepeatedEntity {
                table: child.table_name.clone(),
                key,
            })
        }
    }

    fn entity_key(&self, table: &TableDefinition, element: &Value) -> Result<String> {
        let field = identity_field(table).unwrap_or(table.primary_key.as_str());
        let id = stub_id(element, field);
        if id.is_null() {
            return Err(missing(table, field));
        }
        let encoded = codec::encode(id, column_def(table, &table.primary_key)?, self.dialect)?;
        Ok(encoded.key_text())
    }
}

/// Dedupe key over a collection row's element columns
fn content_key(table: &TableDefinition, row: &Row, owner_column: &str) -> String {
    row.iter()
        .filter(|(column, _)| **column != table.primary_key && column.as_str() != owner_column)
        .map(|(column, value)| format!("{}={}", column, value.key_text()))
        .collect::<Vec<_>>()
        .join(";")
}

fn null_columns(bindings: &[FieldBinding], row: &mut Row) {
    for binding in leaf_bindings(bindings) {
        for column in binding.columns() {
            row.insert(column.to_string(), SqlValue::Null);
        }
    }
}

fn as_elements<'v>(owner: &TableDefinition, field: &str, value: &'v Value) -> Result<&'v [Value]> {
    match value {
        Value::Null => Ok(&[][..]),
        Value::Array(items) => Ok(items.as_slice()),
        other => Err(unexpected(owner, field, "array", other)),
    }
}

/// Map entries from an object or a list of `{key, value}` pairs
fn map_entries<'v>(owner: &TableDefinition, field: &str, value: &'v Value) -> Result<Vec<(Value, &'v Value)>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(obj) => Ok(obj
            .iter()
            .map(|(k, v)| (Value::String(k.clone()), v))
            .collect()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(pair) if pair.contains_key("key") => Ok((
                    pair["key"].clone(),
                    pair.get("value").unwrap_or(&Value::Null),
                )),
                other => Err(unexpected(owner, field, "{key, value} entry", other)),
            })
            .collect(),
        other => Err(unexpected(owner, field, "object", other)),
    }
}

fn missing(table: &TableDefinition, field: &str) -> MappingError {
    MappingError::MissingField {
        table: table.table_name.clone(),
        field: field.to_string(),
    }
}

fn unexpected(table: &TableDefinition, field: &str, expected: &'static str, found: &Value) -> MappingError {
    MappingError::UnexpectedShape {
        table: table.table_name.clone(),
        field: field.to_string(),
        expected,
        found: shape_of(found),
    }
}

/// Rows for every table touched by one aggregate graph
///
/// Collection rows of value objects, primitives and references get a fresh
/// random key on every call.
///
/// # Errors
///
/// `MissingField` for nulls in non-nullable fields, `UnexpectedShape` and
/// `TypeMismatch` for values that do not fit their binding, and the
/// dialect's GUID / timestamp errors.
pub fn flatten(graph: &NestedGraph, schema: &Schema, dialect: &dyn Dialect) -> Result<RowSet> {
    let mut flattener = Flattener {
        schema,
        dialect,
        rows: RowSet::new(),
    };
    flattener.record(schema.root()?, graph, None)?;
    Ok(flattener.rows)
}
