use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::table::{CascadeAction, StorageType};

/// Leaf value kinds a descriptor field can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    Guid,
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

impl PrimitiveType {
    /// Fixed primitive to storage mapping
    pub fn storage(&self) -> StorageType {
        match self {
            PrimitiveType::Guid => StorageType::Guid16,
            PrimitiveType::Text => StorageType::Text,
            PrimitiveType::Integer => StorageType::Integer64,
            PrimitiveType::Float => StorageType::Float64,
            PrimitiveType::Boolean => StorageType::Boolean,
            PrimitiveType::Timestamp => StorageType::TimestampText,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            PrimitiveType::Guid => "guid",
            PrimitiveType::Text => "text",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Float => "float",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Timestamp => "timestamp",
        }
    }

    /// Parse a primitive keyword; anything else is a type name
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "guid" => Some(PrimitiveType::Guid),
            "text" => Some(PrimitiveType::Text),
            "integer" => Some(PrimitiveType::Integer),
            "float" => Some(PrimitiveType::Float),
            "boolean" => Some(PrimitiveType::Boolean),
            "timestamp" => Some(PrimitiveType::Timestamp),
            _ => None,
        }
    }

    /// Whether values of this type can key a map collection
    pub fn is_map_key(&self) -> bool {
        matches!(
            self,
            PrimitiveType::Text | PrimitiveType::Integer | PrimitiveType::Guid
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    List,
    Set,
    Map,
}

/// Element type of a collection: a primitive keyword or a type name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ElementType {
    Primitive(PrimitiveType),
    Type(String),
}

impl ElementType {
    /// Referenced type name, if the element is not a primitive
    pub fn type_name(&self) -> Option<&str> {
        match self {
            ElementType::Primitive(_) => None,
            ElementType::Type(name) => Some(name),
        }
    }
}

impl From<String> for ElementType {
    fn from(value: String) -> Self {
        match PrimitiveType::from_keyword(&value) {
            Some(primitive) => ElementType::Primitive(primitive),
            None => ElementType::Type(value),
        }
    }
}

impl From<&str> for ElementType {
    fn from(value: &str) -> Self {
        ElementType::from(value.to_string())
    }
}

impl From<PrimitiveType> for ElementType {
    fn from(value: PrimitiveType) -> Self {
        ElementType::Primitive(value)
    }
}

impl From<ElementType> for String {
    fn from(value: ElementType) -> Self {
        match value {
            ElementType::Primitive(primitive) => primitive.keyword().to_string(),
            ElementType::Type(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Primitive {
        #[serde(rename = "type")]
        primitive: PrimitiveType,
    },
    Reference {
        target: String,
    },
    Collection {
        collection: CollectionKind,
        element: ElementType,
        /// Map key type; text when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<PrimitiveType>,
    },
}

/// One field of a type descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub identity: bool,
    /// Deletion policy override for cross-aggregate references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<CascadeAction>,
}

impl FieldDescriptor {
    fn with_kind(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            identity: false,
            on_delete: None,
        }
    }

    pub fn primitive(name: impl Into<String>, primitive: PrimitiveType) -> Self {
        Self::with_kind(name, FieldKind::Primitive { primitive })
    }

    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            FieldKind::Reference {
                target: target.into(),
            },
        )
    }

    pub fn list(name: impl Into<String>, element: impl Into<ElementType>) -> Self {
        Self::collection(name, CollectionKind::List, element.into(), None)
    }

    pub fn set(name: impl Into<String>, element: impl Into<ElementType>) -> Self {
        Self::collection(name, CollectionKind::Set, element.into(), None)
    }

    pub fn map(
        name: impl Into<String>,
        key: PrimitiveType,
        element: impl Into<ElementType>,
    ) -> Self {
        Self::collection(name, CollectionKind::Map, element.into(), Some(key))
    }

    fn collection(
        name: impl Into<String>,
        collection: CollectionKind,
        element: ElementType,
        key: Option<PrimitiveType>,
    ) -> Self {
        Self::with_kind(
            name,
            FieldKind::Collection {
                collection,
                element,
                key,
            },
        )
    }

    /// Mark the field nullable
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark the field as the type's identity
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn on_delete(mut self, action: CascadeAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Type name this field points at, through a reference or a collection
    pub fn target_type(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Primitive { .. } => None,
            FieldKind::Reference { target } => Some(target),
            FieldKind::Collection { element, .. } => element.type_name(),
        }
    }

    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        match &self.kind {
            FieldKind::Primitive { primitive } => Some(*primitive),
            _ => None,
        }
    }
}

/// Ordered field list of one domain type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field append
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The identity field: the one flagged `identity`, else a guid field named `id`
    pub fn identity_field(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.identity).or_else(|| {
            self.fields
                .iter()
                .find(|f| f.name == "id" && f.primitive_type() == Some(PrimitiveType::Guid))
        })
    }

    pub fn has_identity(&self) -> bool {
        self.identity_field().is_some()
    }
}

/// Source of type descriptors by name
pub trait DescriptorProvider {
    fn resolve(&self, type_name: &str) -> Option<&TypeDescriptor>;
}

/// In-memory descriptor catalog with designated aggregate roots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCatalog {
    types: BTreeMap<String, TypeDescriptor>,
    roots: BTreeSet<String>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor, returning the one it replaced
    pub fn insert(&mut self, descriptor: TypeDescriptor) -> Option<TypeDescriptor> {
        self.types.insert(descriptor.name.clone(), descriptor)
    }

    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    /// Designate a type as an aggregate root
    pub fn designate_root(&mut self, type_name: impl Into<String>) {
        self.roots.insert(type_name.into());
    }

    pub fn with_root(mut self, type_name: impl Into<String>) -> Self {
        self.designate_root(type_name);
        self
    }

    pub fn roots(&self) -> &BTreeSet<String> {
        &self.roots
    }

    pub fn is_root(&self, type_name: &str) -> bool {
        self.roots.contains(type_name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl DescriptorProvider for TypeCatalog {
    fn resolve(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_name)
    }
}

impl DescriptorProvider for BTreeMap<String, TypeDescriptor> {
    fn resolve(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.get(type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_field_defaults_to_guid_id() {
        let order = TypeDescriptor::new("Order")
            .with_field(FieldDescriptor::primitive("id", PrimitiveType::Guid))
            .with_field(FieldDescriptor::primitive("note", PrimitiveType::Text));
        assert_eq!(order.identity_field().map(|f| f.name.as_str()), Some("id"));

        let money = TypeDescriptor::new("Money")
            .with_field(FieldDescriptor::primitive("id", PrimitiveType::Text))
            .with_field(FieldDescriptor::primitive("amount", PrimitiveType::Float));
        assert!(!money.has_identity());
    }

    #[test]
    fn test_flagged_identity_wins() {
        let sku = TypeDescriptor::new("Sku")
            .with_field(FieldDescriptor::primitive("id", PrimitiveType::Guid))
            .with_field(FieldDescriptor::primitive("code", PrimitiveType::Text).identity());
        assert_eq!(sku.identity_field().map(|f| f.name.as_str()), Some("code"));
    }

    #[test]
    fn test_element_type_keyword_parsing() {
        assert_eq!(
            ElementType::from("integer"),
            ElementType::Primitive(PrimitiveType::Integer)
        );
        assert_eq!(ElementType::from("Item"), ElementType::Type("Item".into()));
        assert_eq!(String::from(ElementType::from("guid")), "guid");
    }

    #[test]
    fn test_field_kind_serde_shape() {
        let field = FieldDescriptor::map("tags", PrimitiveType::Text, "Money").nullable();
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["kind"]["kind"], "collection");
        assert_eq!(json["kind"]["collection"], "map");
        assert_eq!(json["kind"]["element"], "Money");
        assert_eq!(json["kind"]["key"], "text");

        let back: FieldDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, field);
    }

    #[test]
    fn test_catalog_resolves_and_tracks_roots() {
        let catalog = TypeCatalog::new()
            .with_type(TypeDescriptor::new("Order"))
            .with_root("Order");
        assert!(catalog.resolve("Order").is_some());
        assert!(catalog.resolve("Missing").is_none());
        assert!(catalog.is_root("Order"));
        assert_eq!(catalog.len(), 1);
    }
}
