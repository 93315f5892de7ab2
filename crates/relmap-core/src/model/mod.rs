pub mod descriptor;
pub mod role;
pub mod table;
pub mod value;

pub use descriptor::{
    CollectionKind, DescriptorProvider, ElementType, FieldDescriptor, FieldKind, PrimitiveType,
    TypeCatalog, TypeDescriptor,
};
pub use role::{Role, RoleMap};
pub use table::{
    CascadeAction, ColumnDefinition, ElementShape, FieldBinding, ForeignKeyDefinition, Ownership,
    ReferenceTarget, StorageType, TableDefinition,
};
pub use value::{NestedGraph, Row, RowSet, SqlValue, Statement};
