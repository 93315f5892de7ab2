//! CREATE statements and schema fingerprint

use sha2::{Digest, Sha256};

use super::Schema;
use crate::dialect::Dialect;
use crate::model::{Statement, TableDefinition};

fn column_list(columns: &[String], dialect: &dyn Dialect) -> String {
    columns
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CREATE TABLE IF NOT EXISTS` for one table
pub fn create_table_sql(table: &TableDefinition, dialect: &dyn Dialect) -> String {
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let mut line = format!(
                "{} {}",
                dialect.quote_identifier(&c.name),
                dialect.type_name(c.storage_type)
            );
            if !c.nullable {
                line.push_str(" NOT NULL");
            }
            line
        })
        .collect();

    lines.push(format!(
        "PRIMARY KEY ({})",
        dialect.quote_identifier(&table.primary_key)
    ));
    for unique in &table.unique_constraints {
        lines.push(format!("UNIQUE ({})", column_list(unique, dialect)));
    }
    for fk in &table.foreign_keys {
        lines.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
            dialect.quote_identifier(&fk.column),
            dialect.quote_identifier(&fk.referenced_table),
            dialect.quote_identifier(&fk.referenced_column),
            fk.cascade_action.sql()
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        dialect.quote_identifier(&table.table_name),
        lines.join(",\n  ")
    )
}

/// Indexes on foreign-key columns, used by cascades and child fetches
pub fn create_index_sql(table: &TableDefinition, dialect: &dyn Dialect) -> Vec<String> {
    table
        .foreign_keys
        .iter()
        .map(|fk| {
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                dialect.quote_identifier(&format!("idx_{}_{}", table.table_name, fk.column)),
                dialect.quote_identifier(&table.table_name),
                dialect.quote_identifier(&fk.column)
            )
        })
        .collect()
}

/// Idempotent DDL for the whole schema, in creation order
pub fn create_statements(schema: &Schema, dialect: &dyn Dialect) -> Vec<Statement> {
    let mut statements = Vec::new();
    for table in schema.ordered_tables() {
        statements.push(Statement::plain(create_table_sql(table, dialect)));
        statements.extend(create_index_sql(table, dialect).into_iter().map(Statement::plain));
    }
    statements
}

/// SHA-256 (hex) over the generated DDL
///
/// Two schemas with the same fingerprint create identical tables.
pub fn fingerprint(schema: &Schema, dialect: &dyn Dialect) -> String {
    let mut hasher = Sha256::new();
    hasher.update(dialect.name().as_bytes());
    for statement in create_statements(schema, dialect) {
        hasher.update(b"\n");
        hasher.update(statement.sql.as_bytes());
    }
    hex::encode(hasher.finalize())
}
