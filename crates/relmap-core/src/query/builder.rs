use std::collections::BTreeSet;

use crate::dialect::Dialect;
use crate::errors::Result;
use crate::mapping::flatten;
use crate::model::{NestedGraph, Row, RowSet, SqlValue, Statement, TableDefinition};
use crate::schema::{self, Schema};

/// Upper bound on keys per IN list
pub const FETCH_BATCH: usize = 500;

fn placeholders(dialect: &dyn Dialect, start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| dialect.placeholder(i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Distinct non-null keys, first occurrence order
fn distinct_keys(keys: &[SqlValue]) -> Vec<SqlValue> {
    let mut seen = BTreeSet::new();
    keys.iter()
        .filter(|k| !k.is_null() && seen.insert(k.key_text()))
        .cloned()
        .collect()
}

/// SELECT every column of `table` where `column` is one of `keys`
///
/// Keys are deduplicated and split into batches of [`FETCH_BATCH`].
pub fn build_fetch_by_keys(
    table: &TableDefinition,
    column: &str,
    keys: &[SqlValue],
    dialect: &dyn Dialect,
) -> Vec<Statement> {
    let columns = table
        .column_names()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    distinct_keys(keys)
        .chunks(FETCH_BATCH)
        .map(|chunk| {
            let sql = format!(
                "SELECT {} FROM {} WHERE {} IN ({})",
                columns,
                dialect.quote_identifier(&table.table_name),
                dialect.quote_identifier(column),
                placeholders(dialect, 1, chunk.len())
            );
            Statement::new(sql, chunk.to_vec())
        })
        .collect()
}

/// DELETE rows of `table` where `column` is one of `keys`
pub fn build_delete_by_keys(
    table: &TableDefinition,
    column: &str,
    keys: &[SqlValue],
    dialect: &dyn Dialect,
) -> Vec<Statement> {
    distinct_keys(keys)
        .chunks(FETCH_BATCH)
        .map(|chunk| {
            let sql = format!(
                "DELETE FROM {} WHERE {} IN ({})",
                dialect.quote_identifier(&table.table_name),
                dialect.quote_identifier(column),
                placeholders(dialect, 1, chunk.len())
            );
            Statement::new(sql, chunk.to_vec())
        })
        .collect()
}

/// INSERT for collection rows, INSERT .. ON CONFLICT DO UPDATE otherwise
pub fn build_upsert(table: &TableDefinition, row: &Row, dialect: &dyn Dialect) -> Statement {
    let q = |ident: &str| dialect.quote_identifier(ident);
    let names: Vec<&str> = table.column_names().collect();
    let params: Vec<SqlValue> = names
        .iter()
        .map(|c| row.get(*c).cloned().unwrap_or(SqlValue::Null))
        .collect();

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        q(&table.table_name),
        names.iter().map(|c| q(c)).collect::<Vec<_>>().join(", "),
        placeholders(dialect, 1, names.len())
    );
    if !table.synthetic_key {
        let updates: Vec<String> = names
            .iter()
            .filter(|c| **c != table.primary_key)
            .map(|c| format!("{} = excluded.{}", q(c), q(c)))
            .collect();
        sql.push_str(&format!(" ON CONFLICT ({}) DO ", q(&table.primary_key)));
        if updates.is_empty() {
            sql.push_str("NOTHING");
        } else {
            sql.push_str("UPDATE SET ");
            sql.push_str(&updates.join(", "));
        }
    }
    Statement::new(sql, params)
}

/// Statements writing a flattened aggregate, in table creation order
///
/// Collection rows of every saved owner are removed before the new ones are
/// inserted, so elements dropped from a collection disappear on re-save.
///
/// # Errors
///
/// `UnknownTable` if the schema is inconsistent.
pub fn persist_statements(rows: &RowSet, schema: &Schema, dialect: &dyn Dialect) -> Result<Vec<Statement>> {
    let mut statements = Vec::new();
    for table in schema.ordered_tables() {
        if let Some(own) = &table.ownership {
            let owner = schema.table(&own.owner_table)?;
            let owner_keys: Vec<SqlValue> = rows
                .rows(&owner.table_name)
                .iter()
                .filter_map(|r| r.get(&owner.primary_key).cloned())
                .collect();
            statements.extend(build_delete_by_keys(table, &own.owner_column, &owner_keys, dialect));
        }
        for row in rows.rows(&table.table_name) {
            statements.push(build_upsert(table, row, dialect));
        }
    }
    Ok(statements)
}

/// Flatten `graph` and build its persist statements
///
/// # Errors
///
/// Any [`flatten`] error.
pub fn build_persist(graph: &NestedGraph, schema: &Schema, dialect: &dyn Dialect) -> Result<Vec<Statement>> {
    let rows = flatten(graph, schema, dialect)?;
    persist_statements(&rows, schema, dialect)
}

/// Single DELETE of the root row; child rows go by ON DELETE CASCADE
///
/// # Errors
///
/// `UnknownTable` if the schema is inconsistent.
pub fn build_delete(schema: &Schema, id: &SqlValue, dialect: &dyn Dialect) -> Result<Statement> {
    let root = schema.root()?;
    let sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        dialect.quote_identifier(&root.table_name),
        dialect.quote_identifier(&root.primary_key),
        dialect.placeholder(1)
    );
    Ok(Statement::new(sql, vec![id.clone()]))
}

/// CREATE TABLE / INDEX IF NOT EXISTS for every table, dependencies first
pub fn build_create_schema(schema: &Schema, dialect: &dyn Dialect) -> Vec<Statement> {
    schema::create_statements(schema, dialect)
}
