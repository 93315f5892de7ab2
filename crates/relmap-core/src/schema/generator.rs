//! Table generation from classified descriptors

use std::collections::{BTreeMap, BTreeSet};

use super::Schema;
use crate::analysis::GraphAnalysis;
use crate::config::to_snake_case;
use crate::errors::{MappingError, Result};
use crate::model::{
    CascadeAction, CollectionKind, ColumnDefinition, ElementShape, ElementType, FieldBinding,
    FieldDescriptor, FieldKind, ForeignKeyDefinition, Ownership, PrimitiveType, ReferenceTarget,
    Role, RoleMap, StorageType, TableDefinition, TypeDescriptor,
};

const SYNTHETIC_KEY: &str = "id";
const POSITION_COLUMN: &str = "position";
const MAP_KEY_COLUMN: &str = "map_key";
const SCALAR_COLUMN: &str = "value";
const REF_COLUMN: &str = "ref_id";

/// Columns, keys and constraints accumulated for one table
struct TableBuilder {
    def: TableDefinition,
}

impl TableBuilder {
    fn new(table_name: String, owner_type: &str, element: ElementShape) -> Self {
        Self {
            def: TableDefinition {
                table_name,
                owner_type: owner_type.to_string(),
                columns: Vec::new(),
                foreign_keys: Vec::new(),
                unique_constraints: Vec::new(),
                is_root: false,
                primary_key: String::new(),
                synthetic_key: false,
                bindings: Vec::new(),
                element,
                ownership: None,
            },
        }
    }

    fn add_column(&mut self, column: ColumnDefinition) -> Result<()> {
        if self.def.column(&column.name).is_some() {
            return Err(MappingError::DuplicateColumn {
                table: self.def.table_name.clone(),
                column: column.name,
            });
        }
        if column.is_primary_key {
            self.def.primary_key = column.name.clone();
        }
        self.def.columns.push(column);
        Ok(())
    }

    fn add_foreign_key(
        &mut self,
        column: ColumnDefinition,
        referenced_table: &str,
        referenced_column: &str,
        cascade_action: CascadeAction,
    ) -> Result<()> {
        self.def.foreign_keys.push(ForeignKeyDefinition {
            column: column.name.clone(),
            referenced_table: referenced_table.to_string(),
            referenced_column: referenced_column.to_string(),
            cascade_action,
        });
        self.add_column(ColumnDefinition {
            is_foreign_key: true,
            ..column
        })
    }

    fn synthesize_key(&mut self) -> Result<()> {
        self.def.synthetic_key = true;
        // Keys lead the column list.
        let mut key = ColumnDefinition::new(SYNTHETIC_KEY, StorageType::Guid16, false);
        key.is_primary_key = true;
        if self.def.column(SYNTHETIC_KEY).is_some() {
            return Err(MappingError::DuplicateColumn {
                table: self.def.table_name.clone(),
                column: SYNTHETIC_KEY.to_string(),
            });
        }
        self.def.primary_key = SYNTHETIC_KEY.to_string();
        self.def.columns.insert(0, key);
        Ok(())
    }
}

/// Identity column of a root or entity: name and storage
struct KeyInfo {
    field: String,
    column: String,
    storage: StorageType,
}

fn key_info(descriptor: &TypeDescriptor) -> Result<KeyInfo> {
    let identity = descriptor
        .identity_field()
        .ok_or_else(|| MappingError::RootWithoutIdentity {
            type_name: descriptor.name.clone(),
        })?;
    let primitive = identity
        .primitive_type()
        .ok_or_else(|| MappingError::InvalidIdentity {
            type_name: descriptor.name.clone(),
            field: identity.name.clone(),
            reason: "identity must be a primitive".to_string(),
        })?;
    Ok(KeyInfo {
        field: identity.name.clone(),
        column: to_snake_case(&identity.name),
        storage: primitive.storage(),
    })
}

fn prefixed(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        to_snake_case(name)
    } else {
        format!("{}_{}", prefix, to_snake_case(name))
    }
}

/// Owner link to add to an entity table once every table exists
struct ElementOwnership {
    table: String,
    ownership: Ownership,
    owner_storage: StorageType,
    owner_pk: String,
    key_type: PrimitiveType,
}

struct Generator<'a> {
    analysis: &'a GraphAnalysis,
    roles: &'a RoleMap,
    table_names: BTreeMap<String, String>,
    keys: BTreeMap<String, KeyInfo>,
    tables: BTreeMap<String, TableDefinition>,
    /// Child tables and the owner type they were generated for
    collection_owners: BTreeMap<String, String>,
    /// Entity tables that also store collection elements
    element_ownerships: Vec<ElementOwnership>,
}

impl<'a> Generator<'a> {
    fn role(&self, type_name: &str) -> Result<Role> {
        self.roles
            .get(type_name)
            .copied()
            .ok_or_else(|| MappingError::UnresolvedType {
                type_name: type_name.to_string(),
                referenced_by: None,
            })
    }

    fn descriptor(&self, type_name: &str) -> Result<&'a TypeDescriptor> {
        self.analysis
            .descriptor(type_name)
            .ok_or_else(|| MappingError::UnresolvedType {
                type_name: type_name.to_string(),
                referenced_by: None,
            })
    }

    fn table_of(&self, type_name: &str) -> Result<&str> {
        self.table_names
            .get(type_name)
            .map(String::as_str)
            .ok_or_else(|| MappingError::UnknownTable {
                table: type_name.to_string(),
            })
    }

    fn key_of(&self, type_name: &str) -> Result<&KeyInfo> {
        self.keys
            .get(type_name)
            .ok_or_else(|| MappingError::RootWithoutIdentity {
                type_name: type_name.to_string(),
            })
    }

    fn reject_override(owner: &str, field: &FieldDescriptor, reason: &str) -> Result<()> {
        if field.on_delete.is_some() {
            return Err(MappingError::InvalidCascade {
                type_name: owner.to_string(),
                field: field.name.clone(),
                reason: reason.to_string(),
            });
        }
        Ok(())
    }

    /// Restrict unless the field opts into SET NULL
    fn aggregate_action(owner: &str, field: &FieldDescriptor, nullable: bool) -> Result<CascadeAction> {
        match field.on_delete {
            None | Some(CascadeAction::Restrict) => Ok(CascadeAction::Restrict),
            Some(CascadeAction::SetNull) if nullable => Ok(CascadeAction::SetNull),
            Some(CascadeAction::SetNull) => Err(MappingError::InvalidCascade {
                type_name: owner.to_string(),
                field: field.name.clone(),
                reason: "set_null requires a nullable field".to_string(),
            }),
            Some(CascadeAction::Cascade) => Err(MappingError::InvalidCascade {
                type_name: owner.to_string(),
                field: field.name.clone(),
                reason: "cross-aggregate references cannot cascade".to_string(),
            }),
        }
    }

    /// Singular reference column `{column}_id` to another root, entity or a back-edge
    #[allow(clippy::too_many_arguments)]
    fn reference_column(
        &self,
        builder: &mut TableBuilder,
        owner: &str,
        field: &FieldDescriptor,
        column_prefix: &str,
        nullable: bool,
        target: &str,
        back_edge: bool,
    ) -> Result<FieldBinding> {
        let column = format!("{}_id", column_prefix);
        let key = self.key_of(target)?;
        let definition = ColumnDefinition::new(column.clone(), key.storage, nullable);
        let target_binding = if back_edge {
            builder.add_column(definition)?;
            ReferenceTarget::Stub {
                key_field: key.field.clone(),
            }
        } else {
            let table = self.table_of(target)?.to_string();
            match self.role(target)? {
                Role::Entity => {
                    Self::reject_override(owner, field, "entity references always cascade")?;
                    builder.add_foreign_key(definition, &table, &key.column, CascadeAction::Cascade)?;
                    ReferenceTarget::Entity { table }
                }
                Role::AggregateRoot => {
                    let action = Self::aggregate_action(owner, field, nullable)?;
                    builder.add_foreign_key(definition, &table, &key.column, action)?;
                    ReferenceTarget::Aggregate {
                        table,
                        key_field: key.field.clone(),
                    }
                }
                Role::ValueObject => unreachable_value_object(owner, field)?,
            }
        };
        Ok(FieldBinding::Reference {
            field: field.name.clone(),
            column,
            nullable: field.nullable,
            target: target_binding,
        })
    }

    /// Flatten a value object's fields into `builder` under `prefix`
    fn embed(
        &self,
        builder: &mut TableBuilder,
        vo: &TypeDescriptor,
        prefix: &str,
        outer_nullable: bool,
        path: &mut Vec<String>,
    ) -> Result<Vec<FieldBinding>> {
        path.push(vo.name.clone());
        let mut bindings = Vec::with_capacity(vo.fields.len());
        for field in &vo.fields {
            let column = prefixed(prefix, &field.name);
            let nullable = outer_nullable || field.nullable;
            let binding = match &field.kind {
                FieldKind::Primitive { primitive } => {
                    Self::reject_override(&vo.name, field, "only references take on_delete")?;
                    builder.add_column(ColumnDefinition::new(column.clone(), primitive.storage(), nullable))?;
                    FieldBinding::Column {
                        field: field.name.clone(),
                        column,
                        nullable: field.nullable,
                    }
                }
                FieldKind::Reference { target } => {
                    let back_edge = self.analysis.is_back_edge(&vo.name, &field.name);
                    match self.role(target)? {
                        Role::ValueObject if back_edge || path.contains(target) => {
                            return Err(MappingError::ValueObjectCycle {
                                type_name: vo.name.clone(),
                                field: field.name.clone(),
                            });
                        }
                        Role::ValueObject => {
                            Self::reject_override(&vo.name, field, "only references to roots take on_delete")?;
                            let inner = self.descriptor(target)?;
                            FieldBinding::Embedded {
                                field: field.name.clone(),
                                nullable: field.nullable,
                                bindings: self.embed(builder, inner, &column, nullable, path)?,
                            }
                        }
                        Role::Entity if !back_edge => {
                            return Err(MappingError::UnsupportedValueObjectField {
                                type_name: vo.name.clone(),
                                field: field.name.clone(),
                                reason: "value objects cannot own entities".to_string(),
                            });
                        }
                        Role::Entity | Role::AggregateRoot => self.reference_column(
                            builder, &vo.name, field, &column, nullable, target, back_edge,
                        )?,
                    }
                }
                FieldKind::Collection { .. } => {
                    return Err(MappingError::UnsupportedValueObjectField {
                        type_name: vo.name.clone(),
                        field: field.name.clone(),
                        reason: "collections cannot be embedded".to_string(),
                    });
                }
            };
            bindings.push(binding);
        }
        path.pop();
        Ok(bindings)
    }

    /// Map one field of a root or entity
    fn owner_field(
        &mut self,
        builder: &mut TableBuilder,
        owner: &TypeDescriptor,
        field: &FieldDescriptor,
    ) -> Result<FieldBinding> {
        let column = to_snake_case(&field.name);
        match &field.kind {
            FieldKind::Primitive { primitive } => {
                Self::reject_override(&owner.name, field, "only references take on_delete")?;
                let mut definition = ColumnDefinition::new(column.clone(), primitive.storage(), field.nullable);
                definition.is_primary_key = self.key_of(&owner.name)?.field == field.name;
                builder.add_column(definition)?;
                Ok(FieldBinding::Column {
                    field: field.name.clone(),
                    column,
                    nullable: field.nullable,
                })
            }
            FieldKind::Reference { target } => {
                let back_edge = self.analysis.is_back_edge(&owner.name, &field.name);
                match self.role(target)? {
                    Role::ValueObject if back_edge => Err(MappingError::ValueObjectCycle {
                        type_name: owner.name.clone(),
                        field: field.name.clone(),
                    }),
                    Role::ValueObject => {
                        Self::reject_override(&owner.name, field, "only references to roots take on_delete")?;
                        let vo = self.descriptor(target)?;
                        let mut path = Vec::new();
                        Ok(FieldBinding::Embedded {
                            field: field.name.clone(),
                            nullable: field.nullable,
                            bindings: self.embed(builder, vo, &column, field.nullable, &mut path)?,
                        })
                    }
                    Role::Entity | Role::AggregateRoot => self.reference_column(
                        builder, &owner.name, field, &column, field.nullable, target, back_edge,
                    ),
                }
            }
            FieldKind::Collection {
                collection,
                element,
                key,
            } => {
                Self::reject_override(&owner.name, field, "collections always cascade")?;
                let table = self.collection(owner, &builder.def.table_name, field, *collection, element, *key)?;
                Ok(FieldBinding::Collection {
                    field: field.name.clone(),
                    table,
                })
            }
        }
    }

    /// Child table (or entity ownership) for a collection field
    fn collection(
        &mut self,
        owner: &TypeDescriptor,
        owner_table: &str,
        field: &FieldDescriptor,
        collection: CollectionKind,
        element: &ElementType,
        key: Option<PrimitiveType>,
    ) -> Result<String> {
        let key_type = key.unwrap_or(PrimitiveType::Text);
        if collection == CollectionKind::Map && !key_type.is_map_key() {
            return Err(MappingError::UnsupportedMapKey {
                type_name: owner.name.clone(),
                field: field.name.clone(),
            });
        }
        let owner_key = self.key_of(&owner.name)?;
        let ownership = Ownership {
            owner_table: owner_table.to_string(),
            owner_column: format!("{}_id", to_snake_case(&owner.name)),
            field: field.name.clone(),
            collection,
            order_column: match collection {
                CollectionKind::List => Some(POSITION_COLUMN.to_string()),
                CollectionKind::Map => Some(MAP_KEY_COLUMN.to_string()),
                CollectionKind::Set => None,
            },
        };
        let owner_storage = owner_key.storage;
        let owner_pk = owner_key.column.clone();

        let back_edge = self.analysis.is_back_edge(&owner.name, &field.name);
        if let ElementType::Type(target) = element {
            if !back_edge && self.role(target)? == Role::Entity {
                let table = self.table_of(target)?.to_string();
                self.element_ownerships.push(ElementOwnership {
                    table: table.clone(),
                    ownership,
                    owner_storage,
                    owner_pk,
                    key_type,
                });
                return Ok(table);
            }
        }

        let table_name = format!("{}_{}", owner_table, to_snake_case(&field.name));
        let shape = match element {
            ElementType::Primitive(_) => ElementShape::Scalar {
                column: SCALAR_COLUMN.to_string(),
            },
            ElementType::Type(target) => match self.role(target)? {
                Role::ValueObject => ElementShape::Record,
                _ => ElementShape::Stub {
                    column: REF_COLUMN.to_string(),
                    key_field: self.key_of(target)?.field.clone(),
                },
            },
        };
        let mut builder = TableBuilder::new(table_name.clone(), &owner.name, shape);
        builder.synthesize_key()?;
        add_ownership_columns(&mut builder, &ownership, owner_storage, &owner_pk, key_type)?;

        let before = builder.def.columns.len();
        match element {
            ElementType::Primitive(primitive) => {
                builder.add_column(ColumnDefinition::new(SCALAR_COLUMN, primitive.storage(), false))?;
            }
            ElementType::Type(target) => match self.role(target)? {
                Role::ValueObject if back_edge => {
                    return Err(MappingError::ValueObjectCycle {
                        type_name: owner.name.clone(),
                        field: field.name.clone(),
                    });
                }
                Role::ValueObject => {
                    let vo = self.descriptor(target)?;
                    let mut path = Vec::new();
                    let bindings = self.embed(&mut builder, vo, "", false, &mut path)?;
                    builder.def.bindings = bindings;
                }
                role => {
                    let target_key = self.key_of(target)?;
                    let definition = ColumnDefinition::new(REF_COLUMN, target_key.storage, false);
                    if back_edge {
                        builder.add_column(definition)?;
                    } else {
                        debug_assert_eq!(role, Role::AggregateRoot);
                        let table = self.table_of(target)?.to_string();
                        let column = target_key.column.clone();
                        builder.add_foreign_key(definition, &table, &column, CascadeAction::Restrict)?;
                    }
                }
            },
        }

        if collection == CollectionKind::Set {
            let mut unique = vec![ownership.owner_column.clone()];
            unique.extend(builder.def.columns[before..].iter().map(|c| c.name.clone()));
            builder.def.unique_constraints.push(unique);
        }

        if self.tables.contains_key(&table_name) {
            return Err(MappingError::DuplicateTable { table: table_name });
        }
        builder.def.ownership = Some(ownership);
        self.collection_owners
            .insert(table_name.clone(), owner.name.clone());
        self.tables.insert(table_name.clone(), builder.def);
        Ok(table_name)
    }

    fn owner_table(&mut self, descriptor: &TypeDescriptor, role: Role) -> Result<()> {
        let table_name = self.table_of(&descriptor.name)?.to_string();
        let mut builder = TableBuilder::new(table_name.clone(), &descriptor.name, ElementShape::Record);
        builder.def.is_root = role == Role::AggregateRoot;
        for field in &descriptor.fields {
            let binding = self.owner_field(&mut builder, descriptor, field)?;
            builder.def.bindings.push(binding);
        }
        if builder.def.primary_key.is_empty() {
            builder.synthesize_key()?;
        }
        if self.tables.contains_key(&table_name) {
            return Err(MappingError::DuplicateTable { table: table_name });
        }
        self.tables.insert(table_name, builder.def);
        Ok(())
    }

    fn apply_element_ownerships(&mut self) -> Result<()> {
        for pending in std::mem::take(&mut self.element_ownerships) {
            let def = self
                .tables
                .remove(&pending.table)
                .ok_or_else(|| MappingError::UnknownTable {
                    table: pending.table.clone(),
                })?;
            let mut builder = TableBuilder { def };
            add_ownership_columns(
                &mut builder,
                &pending.ownership,
                pending.owner_storage,
                &pending.owner_pk,
                pending.key_type,
            )?;
            builder.def.ownership = Some(pending.ownership);
            self.tables.insert(pending.table, builder.def);
        }
        Ok(())
    }

    /// Entities stored as collection elements need exactly one owning edge
    fn check_ownership(&self) -> Result<()> {
        let mut owners: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        let mut in_collection: BTreeSet<&str> = BTreeSet::new();
        for descriptor in &self.analysis.types {
            for field in &descriptor.fields {
                let Some(target) = field.target_type() else { continue };
                if self.analysis.is_back_edge(&descriptor.name, &field.name)
                    || self.roles.get(target) != Some(&Role::Entity)
                {
                    continue;
                }
                owners
                    .entry(target)
                    .or_default()
                    .push(format!("{}.{}", descriptor.name, field.name));
                if matches!(field.kind, FieldKind::Collection { .. }) {
                    in_collection.insert(target);
                }
            }
        }
        for entity in in_collection {
            let edges = owners.remove(entity).unwrap_or_default();
            if edges.len() > 1 {
                return Err(MappingError::AmbiguousOwnership {
                    type_name: entity.to_string(),
                    owners: edges,
                });
            }
        }
        Ok(())
    }

    /// Kahn's algorithm over foreign keys between generated tables
    fn creation_order(&self) -> Result<Vec<String>> {
        let type_count = self.analysis.types.len();
        let rank = |table: &TableDefinition| -> usize {
            let owner_rank = self.analysis.index_of(&table.owner_type).unwrap_or(type_count);
            if self.collection_owners.contains_key(&table.table_name) {
                type_count + owner_rank
            } else {
                owner_rank
            }
        };

        let mut pending: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for (name, table) in &self.tables {
            let deps = table
                .foreign_keys
                .iter()
                .map(|fk| fk.referenced_table.as_str())
                .filter(|t| *t != name.as_str() && self.tables.contains_key(*t))
                .collect();
            pending.insert(name.as_str(), deps);
        }

        let mut order = Vec::with_capacity(self.tables.len());
        loop {
            let ready: BTreeSet<(usize, &str)> = pending
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(name, _)| (rank(&self.tables[*name]), *name))
                .collect();
            let Some(&(_, next)) = ready.iter().next() else { break };
            pending.remove(next);
            for deps in pending.values_mut() {
                deps.remove(next);
            }
            order.push(next.to_string());
        }

        if !pending.is_empty() {
            return Err(MappingError::TableCycle {
                tables: pending.keys().map(|t| t.to_string()).collect(),
            });
        }
        Ok(order)
    }
}

fn unreachable_value_object(owner: &str, field: &FieldDescriptor) -> Result<ReferenceTarget> {
    Err(MappingError::UnsupportedValueObjectField {
        type_name: owner.to_string(),
        field: field.name.clone(),
        reason: "value objects are embedded, not referenced".to_string(),
    })
}

fn add_ownership_columns(
    builder: &mut TableBuilder,
    ownership: &Ownership,
    owner_storage: StorageType,
    owner_pk: &str,
    key_type: PrimitiveType,
) -> Result<()> {
    builder.add_foreign_key(
        ColumnDefinition::new(ownership.owner_column.clone(), owner_storage, false),
        &ownership.owner_table,
        owner_pk,
        CascadeAction::Cascade,
    )?;
    match ownership.collection {
        CollectionKind::List => {
            builder.add_column(ColumnDefinition::new(POSITION_COLUMN, StorageType::Integer64, false))?;
        }
        CollectionKind::Map => {
            builder.add_column(ColumnDefinition::new(MAP_KEY_COLUMN, key_type.storage(), false))?;
            builder.def.unique_constraints.push(vec![
                ownership.owner_column.clone(),
                MAP_KEY_COLUMN.to_string(),
            ]);
        }
        CollectionKind::Set => {}
    }
    Ok(())
}

/// Build the tables of one analysed, classified aggregate
///
/// # Errors
///
/// Descriptor shapes the relational model cannot carry: embedded
/// collections or entities, value-object cycles, ambiguous entity
/// ownership, invalid `on_delete` overrides, unsupported map keys, name
/// clashes, or foreign-key cycles.
pub fn generate(
    analysis: &GraphAnalysis,
    roles: &RoleMap,
    table_name_for: &dyn Fn(&str) -> String,
) -> Result<Schema> {
    let mut generator = Generator {
        analysis,
        roles,
        table_names: BTreeMap::new(),
        keys: BTreeMap::new(),
        tables: BTreeMap::new(),
        collection_owners: BTreeMap::new(),
        element_ownerships: Vec::new(),
    };

    let owners = analysis
        .types
        .iter()
        .chain(analysis.external_roots.values());
    let mut seen_tables = BTreeSet::new();
    for descriptor in owners {
        let role = generator.role(&descriptor.name)?;
        if !role.owns_table() {
            continue;
        }
        let table = table_name_for(&descriptor.name);
        let internal = analysis.index_of(&descriptor.name).is_some();
        if internal && !seen_tables.insert(table.clone()) {
            return Err(MappingError::DuplicateTable { table });
        }
        generator.keys.insert(descriptor.name.clone(), key_info(descriptor)?);
        generator.table_names.insert(descriptor.name.clone(), table);
    }

    generator.check_ownership()?;

    for descriptor in &analysis.types {
        let role = generator.role(&descriptor.name)?;
        if role.owns_table() {
            generator.owner_table(descriptor, role)?;
        }
    }
    generator.apply_element_ownerships()?;
    let creation_order = generator.creation_order()?;

    let root_table = generator.table_of(&analysis.root)?.to_string();
    let type_tables = analysis
        .types
        .iter()
        .filter_map(|t| {
            generator
                .table_names
                .get(&t.name)
                .map(|table| (t.name.clone(), table.clone()))
        })
        .collect();

    Ok(Schema {
        root_type: analysis.root.clone(),
        root_table,
        tables: generator.tables,
        type_tables,
        creation_order,
    })
}
