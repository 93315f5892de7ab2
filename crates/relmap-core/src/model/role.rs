use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relational role of a discovered type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    AggregateRoot,
    Entity,
    ValueObject,
}

impl Role {
    /// Roots and entities get their own table
    pub fn owns_table(&self) -> bool {
        !matches!(self, Role::ValueObject)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Role::AggregateRoot => "aggregate_root",
            Role::Entity => "entity",
            Role::ValueObject => "value_object",
        };
        f.write_str(label)
    }
}

/// Type name to role lookup, computed once per root
pub type RoleMap = BTreeMap<String, Role>;
