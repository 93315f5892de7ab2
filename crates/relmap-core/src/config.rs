//! Mapping configuration and naming rules

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Naming overrides applied when generating a schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Type name to table name
    #[serde(default)]
    pub table_names: BTreeMap<String, String>,
}

impl MappingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table_name(mut self, type_name: impl Into<String>, table: impl Into<String>) -> Self {
        self.table_names.insert(type_name.into(), table.into());
        self
    }

    /// Table name for a type: the override, else the snake_case plural
    pub fn table_name_for(&self, type_name: &str) -> String {
        self.table_names
            .get(type_name)
            .cloned()
            .unwrap_or_else(|| pluralize(&to_snake_case(type_name)))
    }
}

/// `customerId` -> `customer_id`, `HTTPRequest` -> `http_request`
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' {
            out.push('_');
            continue;
        }
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// English plural of the last word of a snake_case name
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    if word.ends_with("ss")
        || word.ends_with('x')
        || word.ends_with("ch")
        || word.ends_with("sh")
        || word.ends_with('s')
    {
        return format!("{}es", word);
    }
    if let Some(stem) = word.strip_suffix('y') {
        let before = stem.chars().last();
        if before.is_some_and(|c| !"aeiou".contains(c)) {
            return format!("{}ies", stem);
        }
    }
    format!("{}s", word)
}
