use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::{codec, column_def, identity_field, ownership, stub_id};
use crate::dialect::Dialect;
use crate::errors::{MappingError, Result};
use crate::model::{
    CollectionKind, ElementShape, FieldBinding, NestedGraph, ReferenceTarget, TableDefinition,
};
use crate::schema::Schema;

struct Canonicalizer<'a> {
    schema: &'a Schema,
    dialect: &'a dyn Dialect,
}

impl Canonicalizer<'_> {
    fn leaf(&self, table: &TableDefinition, column: &str, value: &Value) -> Result<Value> {
        codec::normalize(value, column_def(table, column)?, self.dialect)
    }

    fn record(&self, table: &TableDefinition, obj: &NestedGraph) -> Result<NestedGraph> {
        let mut out = self.fields(table, &table.bindings, obj)?;
        for binding in &table.bindings {
            if let FieldBinding::Collection { field, table: child } = binding {
                let value = obj.get(field).unwrap_or(&Value::Null);
                out.insert(field.clone(), self.collection(self.schema.table(child)?, value)?);
            }
        }
        Ok(out)
    }

    fn fields(&self, table: &TableDefinition, bindings: &[FieldBinding], obj: &NestedGraph) -> Result<NestedGraph> {
        let mut out = Map::new();
        for binding in bindings {
            let value = obj.get(binding.field()).unwrap_or(&Value::Null);
            let canonical = match binding {
                FieldBinding::Column { column, .. } => self.leaf(table, column, value)?,
                FieldBinding::Embedded { bindings, .. } => match value {
                    Value::Object(inner) => {
                        let inner = self.fields(table, bindings, inner)?;
                        if binding_is_nullable(binding) && all_leaves_null(&inner) {
                            Value::Null
                        } else {
                            Value::Object(inner)
                        }
                    }
                    _ => Value::Null,
                },
                FieldBinding::Reference { column, target, .. } => match (target, value) {
                    (_, Value::Null) => Value::Null,
                    (ReferenceTarget::Entity { table: target }, Value::Object(inner)) => {
                        Value::Object(self.record(self.schema.table(target)?, inner)?)
                    }
                    (ReferenceTarget::Entity { .. }, _) => Value::Null,
                    (ReferenceTarget::Aggregate { key_field, .. }, v)
                    | (ReferenceTarget::Stub { key_field }, v) => {
                        stub(key_field, self.leaf(table, column, stub_id(v, key_field))?)
                    }
                },
                FieldBinding::Collection { .. } => continue,
            };
            out.insert(binding.field().to_string(), canonical);
        }
        Ok(out)
    }

    fn collection(&self, child: &TableDefinition, value: &Value) -> Result<Value> {
        let own = ownership(child)?;
        match own.collection {
            CollectionKind::List => {
                let items = elements(value)
                    .iter()
                    .map(|e| self.element(child, e))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(items))
            }
            CollectionKind::Set => {
                let mut seen = BTreeSet::new();
                let mut items = Vec::new();
                for element in elements(value) {
                    let canonical = self.element(child, element)?;
                    let key = if child.is_record_table() {
                        let field = identity_field(child).unwrap_or(child.primary_key.as_str());
                        stub_id(&canonical, field).to_string()
                    } else {
                        canonical.to_string()
                    };
                    if seen.insert(key) {
                        items.push(canonical);
                    }
                }
                items.sort_by_cached_key(Value::to_string);
                Ok(Value::Array(items))
            }
            CollectionKind::Map => {
                let key_column = column_def(child, own.order_column.as_deref().unwrap_or("map_key"))?;
                let mut out = Map::new();
                let entries: Vec<(Value, &Value)> = match value {
                    Value::Object(obj) => obj.iter().map(|(k, v)| (Value::String(k.clone()), v)).collect(),
                    Value::Array(items) => items
                        .iter()
                        .filter_map(|item| {
                            let pair = item.as_object()?;
                            Some((pair.get("key")?.clone(), pair.get("value").unwrap_or(&Value::Null)))
                        })
                        .collect(),
                    _ => Vec::new(),
                };
                for (key, element) in entries {
                    let encoded = codec::encode_key(&key, key_column, self.dialect)?;
                    let key = codec::decode_key(&encoded, key_column, self.dialect)?;
                    out.insert(key, self.element(child, element)?);
                }
                Ok(Value::Object(out))
            }
        }
    }

    fn element(&self, child: &TableDefinition, element: &Value) -> Result<Value> {
        if child.is_record_table() {
            return match element {
                Value::Object(obj) => self.record(child, obj).map(Value::Object),
                _ => Err(MappingError::MissingField {
                    table: child.table_name.clone(),
                    field: child.owner_type.clone(),
                }),
            };
        }
        match (&child.element, element) {
            (ElementShape::Record, Value::Object(obj)) => {
                self.fields(child, &child.bindings, obj).map(Value::Object)
            }
            (ElementShape::Record, _) => Ok(Value::Null),
            (ElementShape::Scalar { column }, v) => self.leaf(child, column, v),
            (ElementShape::Stub { column, key_field }, v) => {
                Ok(stub(key_field, self.leaf(child, column, stub_id(v, key_field))?))
            }
        }
    }
}

fn binding_is_nullable(binding: &FieldBinding) -> bool {
    matches!(binding, FieldBinding::Embedded { nullable: true, .. })
}

fn all_leaves_null(obj: &NestedGraph) -> bool {
    obj.values().all(|v| match v {
        Value::Null => true,
        Value::Object(inner) => all_leaves_null(inner),
        _ => false,
    })
}

fn elements(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items.as_slice(),
        _ => &[],
    }
}

fn stub(key_field: &str, id: Value) -> Value {
    let mut obj = Map::new();
    obj.insert(key_field.to_string(), id);
    Value::Object(obj)
}

/// Normal form of a graph as it would come back from a store round trip
///
/// Leaves are normalized through the dialect (GUID case, UTC timestamps,
/// floats), unknown fields dropped, all-null nullable value objects become
/// null, sets are deduplicated and sorted, maps keep the last value per key,
/// and references to other aggregates collapse to id stubs.
///
/// # Errors
///
/// Leaf values that cannot be encoded for their column.
pub fn canonicalize(graph: &NestedGraph, schema: &Schema, dialect: &dyn Dialect) -> Result<NestedGraph> {
    Canonicalizer { schema, dialect }.record(schema.root()?, graph)
}
