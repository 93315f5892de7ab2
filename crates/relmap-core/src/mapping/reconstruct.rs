use serde_json::{Map, Value};

use super::{codec, column_def, leaf_bindings, ownership};
use crate::dialect::Dialect;
use crate::errors::{MappingError, Result};
use crate::model::{
    CollectionKind, ElementShape, FieldBinding, NestedGraph, ReferenceTarget, Row, RowSet,
    SqlValue, TableDefinition,
};
use crate::schema::Schema;

struct Rebuilder<'a> {
    rows: &'a RowSet,
    schema: &'a Schema,
    dialect: &'a dyn Dialect,
}

impl Rebuilder<'_> {
    fn record(&self, table: &TableDefinition, row: &Row) -> Result<NestedGraph> {
        let mut obj = self.fields(table, &table.bindings, row)?;
        for binding in &table.bindings {
            if let FieldBinding::Collection { field, table: child } = binding {
                let value = self.collection(table, row, self.schema.table(child)?)?;
                obj.insert(field.clone(), value);
            }
        }
        Ok(obj)
    }

    fn cell(&self, table: &TableDefinition, row: &Row, column: &str) -> Result<Value> {
        let value = row.get(column).unwrap_or(&SqlValue::Null);
        codec::decode(value, column_def(table, column)?, self.dialect)
    }

    fn fields(&self, table: &TableDefinition, bindings: &[FieldBinding], row: &Row) -> Result<NestedGraph> {
        let mut obj = Map::new();
        for binding in bindings {
            let value = match binding {
                FieldBinding::Column { column, .. } => self.cell(table, row, column)?,
                FieldBinding::Embedded {
                    nullable, bindings, ..
                } => {
                    let all_null = leaf_bindings(bindings)
                        .iter()
                        .flat_map(|b| b.columns())
                        .all(|c| row.get(c).map_or(true, SqlValue::is_null));
                    if *nullable && all_null {
                        Value::Null
                    } else {
                        Value::Object(self.fields(table, bindings, row)?)
                    }
                }
                FieldBinding::Reference { column, target, .. } => {
                    let key = row.get(column).unwrap_or(&SqlValue::Null);
                    if key.is_null() {
                        Value::Null
                    } else {
                        match target {
                            ReferenceTarget::Entity { table: target } => {
                                let target = self.schema.table(target)?;
                                let found = self
                                    .rows
                                    .rows(&target.table_name)
                                    .iter()
                                    .find(|r| r.get(&target.primary_key) == Some(key))
                                    .ok_or_else(|| MappingError::DanglingReference {
                                        table: table.table_name.clone(),
                                        column: column.clone(),
                                    })?;
                                Value::Object(self.record(target, found)?)
                            }
                            ReferenceTarget::Aggregate { key_field, .. }
                            | ReferenceTarget::Stub { key_field } => {
                                stub(key_field, self.cell(table, row, column)?)
                            }
                        }
                    }
                }
                FieldBinding::Collection { .. } => continue,
            };
            obj.insert(binding.field().to_string(), value);
        }
        Ok(obj)
    }

    fn collection(&self, owner: &TableDefinition, owner_row: &Row, child: &TableDefinition) -> Result<Value> {
        let own = ownership(child)?;
        let owner_key = owner_row.get(&owner.primary_key).unwrap_or(&SqlValue::Null);
        let mut members: Vec<&Row> = self
            .rows
            .rows(&child.table_name)
            .iter()
            .filter(|r| r.get(&own.owner_column) == Some(owner_key))
            .collect();

        match own.collection {
            CollectionKind::List => {
                let position = own.order_column.as_deref().unwrap_or("position");
                members.sort_by_key(|r| match r.get(position) {
                    Some(SqlValue::Integer(i)) => *i,
                    _ => i64::MAX,
                });
                let items = members
                    .into_iter()
                    .map(|r| self.element(child, r))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(items))
            }
            CollectionKind::Set => {
                let mut items = members
                    .into_iter()
                    .map(|r| self.element(child, r))
                    .collect::<Result<Vec<_>>>()?;
                items.sort_by_cached_key(Value::to_string);
                Ok(Value::Array(items))
            }
            CollectionKind::Map => {
                let key_column = column_def(child, own.order_column.as_deref().unwrap_or("map_key"))?;
                let mut entries = Map::new();
                for r in members {
                    let key = r.get(&key_column.name).unwrap_or(&SqlValue::Null);
                    let key = codec::decode_key(key, key_column, self.dialect)?;
                    entries.insert(key, self.element(child, r)?);
                }
                Ok(Value::Object(entries))
            }
        }
    }

    fn element(&self, child: &TableDefinition, row: &Row) -> Result<Value> {
        if child.is_record_table() {
            return self.record(child, row).map(Value::Object);
        }
        match &child.element {
            ElementShape::Record => self.fields(child, &child.bindings, row).map(Value::Object),
            ElementShape::Scalar { column } => self.cell(child, row, column),
            ElementShape::Stub { column, key_field } => {
                Ok(stub(key_field, self.cell(child, row, column)?))
            }
        }
    }
}

fn stub(key_field: &str, id: Value) -> Value {
    let mut obj = Map::new();
    obj.insert(key_field.to_string(), id);
    Value::Object(obj)
}

/// Rebuild the aggregate graph rooted at the single row of `root_table`
///
/// Synthetic keys and ownership columns never appear in the result.
///
/// # Errors
///
/// `MissingRootRow` / `MultipleRootRows` unless the root table holds exactly
/// one row, `DanglingReference` when an entity row is absent, and decode
/// failures for values that do not fit their column.
pub fn reconstruct(rows: &RowSet, root_table: &str, schema: &Schema, dialect: &dyn Dialect) -> Result<NestedGraph> {
    let table = schema.table(root_table)?;
    let root_row = match rows.rows(root_table) {
        [row] => row,
        [] => {
            return Err(MappingError::MissingRootRow {
                table: root_table.to_string(),
            })
        }
        many => {
            return Err(MappingError::MultipleRootRows {
                table: root_table.to_string(),
                count: many.len(),
            })
        }
    };
    Rebuilder {
        rows,
        schema,
        dialect,
    }
    .record(table, root_row)
}
