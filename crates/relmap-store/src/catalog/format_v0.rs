//! Catalog Format v0 schema
//!
//! Defines the YAML structure for descriptor catalogs:
//!
//! ```yaml
//! schema_version: 0
//! aggregates: [Order]
//! mapping:
//!   table_names:
//!     Person: people
//! types:
//!   - name: Order
//!     fields:
//!       - { name: id, type: guid }
//!       - { name: total, type: Money }
//!       - { name: items, list: Item }
//!       - { name: ratings, map: integer, key: text }
//! ```

use relmap_core::model::CascadeAction;
use relmap_core::MappingConfig;
use serde::{Deserialize, Serialize};

/// Top-level catalog file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogV0 {
    /// Schema version (must be 0 for this format)
    pub schema_version: u32,

    /// Types designated as aggregate roots
    #[serde(default)]
    pub aggregates: Vec<String>,

    #[serde(default)]
    pub mapping: MappingConfig,

    pub types: Vec<CatalogType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogType {
    pub name: String,

    #[serde(default)]
    pub fields: Vec<CatalogField>,
}

/// Field definition in a catalog
///
/// Exactly one of `type`, `list`, `set` or `map` gives the field's shape.
/// `type` names either a primitive keyword or another type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogField {
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,

    /// Map key keyword; text when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default)]
    pub nullable: bool,

    #[serde(default)]
    pub identity: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<CascadeAction>,
}
