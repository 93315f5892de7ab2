use serde::{Deserialize, Serialize};

use super::descriptor::CollectionKind;

/// Column storage classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageType {
    Guid16,
    Text,
    Integer64,
    Float64,
    Boolean,
    TimestampText,
}

/// Referential action applied when the referenced row is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeAction {
    Cascade,
    Restrict,
    SetNull,
}

impl CascadeAction {
    pub fn sql(&self) -> &'static str {
        match self {
            CascadeAction::Cascade => "CASCADE",
            CascadeAction::Restrict => "RESTRICT",
            CascadeAction::SetNull => "SET NULL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub storage_type: StorageType,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, storage_type: StorageType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            storage_type,
            nullable,
            is_primary_key: false,
            is_foreign_key: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub cascade_action: CascadeAction,
}

/// Where a reference column points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceTarget {
    /// An entity row inside the aggregate, loaded and saved with it
    Entity { table: String },
    /// Another aggregate's root; only the id is stored and surfaced
    Aggregate { table: String, key_field: String },
    /// A back-edge; id only, no foreign key
    Stub { key_field: String },
}

/// How one descriptor field lands in a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldBinding {
    Column {
        field: String,
        column: String,
        nullable: bool,
    },
    /// Value object flattened into prefixed columns
    Embedded {
        field: String,
        nullable: bool,
        bindings: Vec<FieldBinding>,
    },
    Reference {
        field: String,
        column: String,
        nullable: bool,
        target: ReferenceTarget,
    },
    Collection {
        field: String,
        table: String,
    },
}

impl FieldBinding {
    pub fn field(&self) -> &str {
        match self {
            FieldBinding::Column { field, .. }
            | FieldBinding::Embedded { field, .. }
            | FieldBinding::Reference { field, .. }
            | FieldBinding::Collection { field, .. } => field,
        }
    }

    /// Every column this binding writes on its own table
    pub fn columns(&self) -> Vec<&str> {
        match self {
            FieldBinding::Column { column, .. } | FieldBinding::Reference { column, .. } => {
                vec![column.as_str()]
            }
            FieldBinding::Embedded { bindings, .. } => {
                bindings.iter().flat_map(|b| b.columns()).collect()
            }
            FieldBinding::Collection { .. } => Vec::new(),
        }
    }
}

/// What one row of a table represents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementShape {
    /// A root, entity or value-object record described by `bindings`
    Record,
    /// A primitive collection element stored in `column`
    Scalar { column: String },
    /// A referenced id stored in `column`, surfaced as `{key_field: id}`
    Stub { column: String, key_field: String },
}

/// Link from a collection row back to the row that owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    pub owner_table: String,
    pub owner_column: String,
    pub field: String,
    pub collection: CollectionKind,
    /// `position` for lists, `map_key` for maps
    pub order_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub table_name: String,
    pub owner_type: String,
    pub columns: Vec<ColumnDefinition>,
    pub foreign_keys: Vec<ForeignKeyDefinition>,
    pub unique_constraints: Vec<Vec<String>>,
    pub is_root: bool,
    pub primary_key: String,
    /// The primary key is a random GUID that never reaches the graph
    pub synthetic_key: bool,
    pub bindings: Vec<FieldBinding>,
    pub element: ElementShape,
    pub ownership: Option<Ownership>,
}

impl TableDefinition {
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn primary_key_column(&self) -> Option<&ColumnDefinition> {
        self.column(&self.primary_key)
    }

    /// Row of an entity or root (not a collection element table)
    pub fn is_record_table(&self) -> bool {
        !self.synthetic_key && self.element == ElementShape::Record
    }

    /// Entity reference columns and the tables they point at
    pub fn entity_references(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().filter_map(|b| match b {
            FieldBinding::Reference {
                column,
                target: ReferenceTarget::Entity { table },
                ..
            } => Some((column.as_str(), table.as_str())),
            _ => None,
        })
    }

    /// Child tables of this table's collection fields
    pub fn collection_tables(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().filter_map(|b| match b {
            FieldBinding::Collection { table, .. } => Some(table.as_str()),
            _ => None,
        })
    }
}
