//! Catalog parser with validation
//!
//! Parses YAML and validates schema version, type name uniqueness, field
//! shapes, and that every referenced type and aggregate is declared.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use relmap_core::model::{
    ElementType, FieldDescriptor, PrimitiveType, TypeCatalog, TypeDescriptor,
};

use super::format_v0::{CatalogField, CatalogV0};
use super::Catalog;
use crate::errors::{catalog_validation, io_error, Result};

/// Parse a catalog file from a path
pub fn parse_catalog_file(path: &Path) -> Result<Catalog> {
    let content = fs::read_to_string(path).map_err(|e| io_error("catalog_read", e))?;
    parse_catalog_str(&content)
}

/// Parse a catalog from a string
pub fn parse_catalog_str(content: &str) -> Result<Catalog> {
    let raw: CatalogV0 = serde_yaml::from_str(content)
        .map_err(|e| catalog_validation(&format!("YAML parse error: {}", e)))?;

    let catalog = build_catalog(&raw)?;
    tracing::debug!(
        type_count = catalog.types.len(),
        aggregate_count = catalog.types.roots().len(),
        "catalog parsed"
    );
    Ok(catalog)
}

fn build_catalog(raw: &CatalogV0) -> Result<Catalog> {
    if raw.schema_version != 0 {
        return Err(catalog_validation(&format!(
            "Unsupported schema_version: {}. Expected 0",
            raw.schema_version
        )));
    }

    let mut declared = BTreeSet::new();
    for ty in &raw.types {
        if PrimitiveType::from_keyword(&ty.name).is_some() {
            return Err(catalog_validation(&format!(
                "Type name {} is a reserved primitive keyword",
                ty.name
            )));
        }
        if !declared.insert(ty.name.as_str()) {
            return Err(catalog_validation(&format!("Duplicate type {}", ty.name)));
        }
    }

    let mut types = TypeCatalog::new();
    for ty in &raw.types {
        let mut descriptor = TypeDescriptor::new(&ty.name);
        let mut field_names = BTreeSet::new();
        for field in &ty.fields {
            if !field_names.insert(field.name.as_str()) {
                return Err(catalog_validation(&format!(
                    "Duplicate field {} in type {}",
                    field.name, ty.name
                )));
            }
            let descriptor_field = build_field(&ty.name, field)?;
            if let Some(target) = descriptor_field.target_type() {
                if !declared.contains(target) {
                    return Err(catalog_validation(&format!(
                        "Field {}.{} references undeclared type {}",
                        ty.name, field.name, target
                    )));
                }
            }
            descriptor = descriptor.with_field(descriptor_field);
        }
        types.insert(descriptor);
    }

    for aggregate in &raw.aggregates {
        if !declared.contains(aggregate.as_str()) {
            return Err(catalog_validation(&format!(
                "Aggregate {} is not a declared type",
                aggregate
            )));
        }
        types.designate_root(aggregate);
    }

    for type_name in raw.mapping.table_names.keys() {
        if !declared.contains(type_name.as_str()) {
            return Err(catalog_validation(&format!(
                "Table name override for undeclared type {}",
                type_name
            )));
        }
    }

    Ok(Catalog {
        types,
        mapping: raw.mapping.clone(),
    })
}

fn build_field(type_name: &str, field: &CatalogField) -> Result<FieldDescriptor> {
    let shapes = [
        field.type_name.is_some(),
        field.list.is_some(),
        field.set.is_some(),
        field.map.is_some(),
    ];
    if shapes.iter().filter(|s| **s).count() != 1 {
        return Err(catalog_validation(&format!(
            "Field {}.{} must declare exactly one of type, list, set, map",
            type_name, field.name
        )));
    }
    if field.key.is_some() && field.map.is_none() {
        return Err(catalog_validation(&format!(
            "Field {}.{} declares a key but is not a map",
            type_name, field.name
        )));
    }

    let mut descriptor = if let Some(name) = &field.type_name {
        match PrimitiveType::from_keyword(name) {
            Some(primitive) => FieldDescriptor::primitive(&field.name, primitive),
            None => FieldDescriptor::reference(&field.name, name),
        }
    } else if let Some(element) = &field.list {
        FieldDescriptor::list(&field.name, ElementType::from(element.as_str()))
    } else if let Some(element) = &field.set {
        FieldDescriptor::set(&field.name, ElementType::from(element.as_str()))
    } else if let Some(element) = &field.map {
        let key = match field.key.as_deref() {
            None => PrimitiveType::Text,
            Some(keyword) => PrimitiveType::from_keyword(keyword).ok_or_else(|| {
                catalog_validation(&format!(
                    "Field {}.{} has unknown key type {}",
                    type_name, field.name, keyword
                ))
            })?,
        };
        FieldDescriptor::map(&field.name, key, ElementType::from(element.as_str()))
    } else {
        return Err(catalog_validation(&format!(
            "Field {}.{} has no shape",
            type_name, field.name
        )));
    };

    if field.nullable {
        descriptor = descriptor.nullable();
    }
    if field.identity {
        descriptor = descriptor.identity();
    }
    if let Some(action) = field.on_delete {
        descriptor = descriptor.on_delete(action);
    }
    Ok(descriptor)
}
