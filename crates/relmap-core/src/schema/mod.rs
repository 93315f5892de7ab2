//! Relational schema for one aggregate

pub mod ddl;
pub mod generator;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::errors::{MappingError, Result};
use crate::model::TableDefinition;

pub use ddl::{create_statements, fingerprint};
pub use generator::generate;

/// Every table of one aggregate, with creation order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub root_type: String,
    pub root_table: String,
    pub tables: BTreeMap<String, TableDefinition>,
    /// Root and entity type names to their tables
    pub type_tables: BTreeMap<String, String>,
    /// Referenced tables before referencing ones
    pub creation_order: Vec<String>,
}

impl Schema {
    /// # Errors
    ///
    /// `UnknownTable` when the schema has no such table.
    pub fn table(&self, name: &str) -> Result<&TableDefinition> {
        self.tables
            .get(name)
            .ok_or_else(|| MappingError::UnknownTable {
                table: name.to_string(),
            })
    }

    /// # Errors
    ///
    /// `UnknownTable` if the root table is missing.
    pub fn root(&self) -> Result<&TableDefinition> {
        self.table(&self.root_table)
    }

    /// Tables in creation order
    pub fn ordered_tables(&self) -> impl Iterator<Item = &TableDefinition> {
        self.creation_order
            .iter()
            .filter_map(|name| self.tables.get(name))
    }
}
