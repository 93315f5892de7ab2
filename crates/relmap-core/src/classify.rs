//! Role classification

use std::collections::BTreeMap;

use crate::errors::{MappingError, Result};
use crate::model::{Role, RoleMap, TypeDescriptor};

fn check_identity(descriptor: &TypeDescriptor) -> Result<bool> {
    let flagged: Vec<_> = descriptor.fields.iter().filter(|f| f.identity).collect();
    if flagged.len() > 1 {
        return Err(MappingError::InvalidIdentity {
            type_name: descriptor.name.clone(),
            field: flagged[1].name.clone(),
            reason: "more than one identity field".to_string(),
        });
    }
    let Some(identity) = descriptor.identity_field() else {
        return Ok(false);
    };
    if identity.primitive_type().is_none() {
        return Err(MappingError::InvalidIdentity {
            type_name: descriptor.name.clone(),
            field: identity.name.clone(),
            reason: "identity must be a primitive".to_string(),
        });
    }
    if identity.nullable {
        return Err(MappingError::InvalidIdentity {
            type_name: descriptor.name.clone(),
            field: identity.name.clone(),
            reason: "identity must not be nullable".to_string(),
        });
    }
    Ok(true)
}

fn root_role(descriptor: &TypeDescriptor) -> Result<Role> {
    if check_identity(descriptor)? {
        Ok(Role::AggregateRoot)
    } else {
        Err(MappingError::RootWithoutIdentity {
            type_name: descriptor.name.clone(),
        })
    }
}

/// Assign a role to every type of an analysed aggregate
///
/// `types` are the types inside the boundary, `external_roots` the other
/// aggregate roots they reference.
///
/// # Errors
///
/// `RootWithoutIdentity` for a root lacking an identity field,
/// `InvalidIdentity` for a nullable, non-primitive or repeated identity.
pub fn classify(
    types: &[TypeDescriptor],
    root: &str,
    external_roots: &BTreeMap<String, TypeDescriptor>,
) -> Result<RoleMap> {
    let mut roles = RoleMap::new();
    for descriptor in types {
        let role = if descriptor.name == root {
            root_role(descriptor)?
        } else if check_identity(descriptor)? {
            Role::Entity
        } else {
            Role::ValueObject
        };
        roles.insert(descriptor.name.clone(), role);
    }
    for descriptor in external_roots.values() {
        roles.insert(descriptor.name.clone(), root_role(descriptor)?);
    }
    Ok(roles)
}
