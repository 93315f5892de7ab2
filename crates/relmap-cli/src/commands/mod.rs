//! Subcommand handlers

pub mod apply;
pub mod plan;
pub mod schema;

use std::path::Path;
use std::sync::Arc;

use relmap_core::SqliteDialect;
use relmap_engine::TransactionalExecutor;
use relmap_store::{parse_catalog_file, Catalog};

/// Parse `path` and build an executor over it
pub fn load(path: &Path) -> Result<(Catalog, TransactionalExecutor), Box<dyn std::error::Error>> {
    let catalog = parse_catalog_file(path)?;
    let executor = TransactionalExecutor::from_catalog(catalog.clone(), Arc::new(SqliteDialect));
    Ok((catalog, executor))
}

/// The requested root, else every aggregate the catalog declares
pub fn selected_roots(
    catalog: &Catalog,
    root: Option<String>,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    match root {
        Some(root) => Ok(vec![root]),
        None => {
            let roots: Vec<String> = catalog.aggregates().map(str::to_string).collect();
            if roots.is_empty() {
                return Err("catalog declares no aggregates; pass --root".into());
            }
            Ok(roots)
        }
    }
}
