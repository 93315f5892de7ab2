//! Compile-once cache of per-root mappings

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use relmap_core::errors::{ExError, ExErrorKind, ExResult};
use relmap_core::model::{RoleMap, TypeCatalog};
use relmap_core::schema::{self, Schema};
use relmap_core::{analyze, classify, Dialect, GraphAnalysis, MappingConfig};

/// Everything derived from one aggregate root's descriptors
#[derive(Debug, Clone)]
pub struct AggregateMapping {
    pub root: String,
    pub analysis: GraphAnalysis,
    pub roles: RoleMap,
    pub schema: Schema,
    /// Graph field holding the root's id
    pub identity_field: String,
    /// SHA-256 of the generated DDL
    pub fingerprint: String,
}

/// Catalog plus the mappings compiled from it so far
pub struct MappingRegistry {
    catalog: TypeCatalog,
    config: MappingConfig,
    dialect: Arc<dyn Dialect>,
    cache: RwLock<BTreeMap<String, Arc<AggregateMapping>>>,
}

fn poisoned() -> ExError {
    ExError::new(ExErrorKind::Internal)
        .with_op("mapping_cache")
        .with_message("mapping cache lock poisoned")
}

impl MappingRegistry {
    pub fn new(catalog: TypeCatalog, config: MappingConfig, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            catalog,
            config,
            dialect,
            cache: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// The cached mapping for `root`, compiling it on first use
    ///
    /// Concurrent first calls may both compile; the first insert wins and
    /// every caller gets the same `Arc`.
    ///
    /// # Errors
    ///
    /// Any analysis, classification or schema generation failure.
    pub fn mapping(&self, root: &str) -> ExResult<Arc<AggregateMapping>> {
        if let Some(found) = self.cache.read().map_err(|_| poisoned())?.get(root) {
            return Ok(Arc::clone(found));
        }

        let compiled = Arc::new(self.compile(root)?);
        let mut cache = self.cache.write().map_err(|_| poisoned())?;
        let entry = cache.entry(root.to_string()).or_insert(compiled);
        Ok(Arc::clone(entry))
    }

    /// Analyse, classify and generate without touching the cache
    ///
    /// # Errors
    ///
    /// Any analysis, classification or schema generation failure.
    pub fn compile(&self, root: &str) -> ExResult<AggregateMapping> {
        let mut roots: BTreeSet<String> = self.catalog.roots().clone();
        roots.insert(root.to_string());

        let analysis = analyze(root, &self.catalog, &roots)?;
        let roles = classify(&analysis.types, root, &analysis.external_roots)?;
        let schema = schema::generate(&analysis, &roles, &|t| self.config.table_name_for(t))?;

        let identity_field = analysis
            .descriptor(root)
            .and_then(|d| d.identity_field())
            .map(|f| f.name.clone())
            .ok_or_else(|| {
                ExError::new(ExErrorKind::InvalidDescriptor)
                    .with_type_name(root)
                    .with_message("aggregate root has no identity field")
            })?;
        let fingerprint = schema::fingerprint(&schema, self.dialect.as_ref());

        tracing::debug!(
            root_type = root,
            table_count = schema.tables.len(),
            fingerprint = %fingerprint,
            "aggregate compiled"
        );

        Ok(AggregateMapping {
            root: root.to_string(),
            analysis,
            roles,
            schema,
            identity_field,
            fingerprint,
        })
    }

    /// Roots compiled so far
    pub fn cached_roots(&self) -> Vec<String> {
        self.cache
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmap_core::model::{FieldDescriptor, PrimitiveType, Role, TypeDescriptor};
    use relmap_core::SqliteDialect;

    fn registry() -> MappingRegistry {
        let catalog = TypeCatalog::new()
            .with_type(
                TypeDescriptor::new("Note")
                    .with_field(FieldDescriptor::primitive("id", PrimitiveType::Guid))
                    .with_field(FieldDescriptor::set("labels", PrimitiveType::Text)),
            )
            .with_type(
                TypeDescriptor::new("Orphan")
                    .with_field(FieldDescriptor::primitive("text", PrimitiveType::Text)),
            )
            .with_root("Note");
        MappingRegistry::new(catalog, MappingConfig::default(), Arc::new(SqliteDialect))
    }

    #[test]
    fn test_mapping_is_compiled_once() {
        let registry = registry();
        let first = registry.mapping("Note").unwrap();
        let second = registry.mapping("Note").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.cached_roots(), vec!["Note"]);
        assert_eq!(first.identity_field, "id");
        assert_eq!(first.roles.get("Note"), Some(&Role::AggregateRoot));
        assert_eq!(first.schema.creation_order, vec!["notes", "notes_labels"]);
    }

    #[test]
    fn test_unknown_root_is_not_cached() {
        let registry = registry();
        let err = registry.mapping("Ghost").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::UnresolvedType);
        assert!(registry.cached_roots().is_empty());
    }

    #[test]
    fn test_root_without_identity_fails() {
        let registry = registry();
        let err = registry.mapping("Orphan").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidDescriptor);
    }
}
