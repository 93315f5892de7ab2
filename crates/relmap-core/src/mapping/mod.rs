//! Bidirectional mapping between nested graphs and rows
//!
//! `flatten` turns one aggregate graph into rows for every table of its
//! schema, `reconstruct` does the reverse from rows fetched by the load
//! queries, and `canonicalize` gives the normal form both sides agree on:
//! `reconstruct(flatten(g)) == canonicalize(g)`.

pub mod canonical;
pub mod codec;
pub mod flatten;
pub mod reconstruct;

use serde_json::Value;

use crate::dialect::Dialect;
use crate::errors::{MappingError, Result};
use crate::model::{ColumnDefinition, FieldBinding, NestedGraph, Ownership, RowSet, TableDefinition};
use crate::schema::Schema;

pub use canonical::canonicalize;
pub use flatten::flatten;
pub use reconstruct::reconstruct;

/// Schema plus dialect, bundled for repeated mapping calls
#[derive(Clone, Copy)]
pub struct RelationalMapper<'a> {
    schema: &'a Schema,
    dialect: &'a dyn Dialect,
}

impl<'a> RelationalMapper<'a> {
    pub fn new(schema: &'a Schema, dialect: &'a dyn Dialect) -> Self {
        Self { schema, dialect }
    }

    /// # Errors
    ///
    /// See [`flatten`].
    pub fn flatten(&self, graph: &NestedGraph) -> Result<RowSet> {
        flatten(graph, self.schema, self.dialect)
    }

    /// # Errors
    ///
    /// See [`reconstruct`].
    pub fn reconstruct(&self, rows: &RowSet) -> Result<NestedGraph> {
        reconstruct(rows, &self.schema.root_table, self.schema, self.dialect)
    }

    /// # Errors
    ///
    /// See [`canonicalize`].
    pub fn canonicalize(&self, graph: &NestedGraph) -> Result<NestedGraph> {
        canonicalize(graph, self.schema, self.dialect)
    }
}

pub(crate) fn column_def<'t>(table: &'t TableDefinition, column: &str) -> Result<&'t ColumnDefinition> {
    table.column(column).ok_or_else(|| MappingError::MissingField {
        table: table.table_name.clone(),
        field: column.to_string(),
    })
}

pub(crate) fn ownership(table: &TableDefinition) -> Result<&Ownership> {
    table
        .ownership
        .as_ref()
        .ok_or_else(|| MappingError::UnknownTable {
            table: table.table_name.clone(),
        })
}

/// Graph field that holds a record table's primary key
pub(crate) fn identity_field(table: &TableDefinition) -> Option<&str> {
    table.bindings.iter().find_map(|b| match b {
        FieldBinding::Column { field, column, .. } if *column == table.primary_key => {
            Some(field.as_str())
        }
        _ => None,
    })
}

/// The id of a reference given either as `{key_field: id}` or as a bare id
pub(crate) fn stub_id<'v>(value: &'v Value, key_field: &str) -> &'v Value {
    match value {
        Value::Object(obj) => obj.get(key_field).unwrap_or(&Value::Null),
        other => other,
    }
}

pub(crate) fn shape_of(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

/// Leaf columns of a binding tree, embedded groups included
pub(crate) fn leaf_bindings(bindings: &[FieldBinding]) -> Vec<&FieldBinding> {
    bindings
        .iter()
        .flat_map(|b| match b {
            FieldBinding::Embedded { bindings, .. } => leaf_bindings(bindings),
            FieldBinding::Collection { .. } => Vec::new(),
            other => vec![other],
        })
        .collect()
}
