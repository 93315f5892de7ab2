//! Descriptor catalog files
//!
//! A catalog declares the types of a domain model, which of them are
//! aggregate roots, and table naming overrides.

pub mod format_v0;
pub mod parser;

use relmap_core::model::TypeCatalog;
use relmap_core::MappingConfig;

pub use format_v0::CatalogV0;
pub use parser::{parse_catalog_file, parse_catalog_str};

/// A validated catalog, ready for analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub types: TypeCatalog,
    pub mapping: MappingConfig,
}

impl Catalog {
    pub fn aggregates(&self) -> impl Iterator<Item = &str> {
        self.types.roots().iter().map(String::as_str)
    }
}
