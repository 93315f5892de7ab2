use relmap_core_types::RequestId;
use std::sync::Arc;
use thiserror::Error;

use crate::model::StorageType;

/// Result type alias for analysis, schema generation and mapping
pub type Result<T> = std::result::Result<T, MappingError>;

/// Result type alias for operations that cross the store boundary
pub type ExResult<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every error that leaves the engine carries exactly one kind. Store-level
/// failures are classified into `NotFound` .. `Unknown` at the connection
/// boundary; the remaining kinds come from descriptor analysis and mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    // Store
    NotFound,
    Duplicate,
    ConstraintViolation,
    ConnectionFailure,
    Timeout,
    Unknown,

    // Descriptors / schema
    InvalidInput,
    InvalidDescriptor,
    UnresolvedType,
    CycleDetected,
    AmbiguousOwnership,

    // Mapping
    InvalidGraph,
    Serialization,

    // Integration
    Io,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Duplicate => "ERR_DUPLICATE",
            ExErrorKind::ConstraintViolation => "ERR_CONSTRAINT_VIOLATION",
            ExErrorKind::ConnectionFailure => "ERR_CONNECTION_FAILURE",
            ExErrorKind::Timeout => "ERR_TIMEOUT",
            ExErrorKind::Unknown => "ERR_UNKNOWN",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidDescriptor => "ERR_INVALID_DESCRIPTOR",
            ExErrorKind::UnresolvedType => "ERR_UNRESOLVED_TYPE",
            ExErrorKind::CycleDetected => "ERR_CYCLE_DETECTED",
            ExErrorKind::AmbiguousOwnership => "ERR_AMBIGUOUS_OWNERSHIP",
            ExErrorKind::InvalidGraph => "ERR_INVALID_GRAPH",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// True for kinds that describe a conflict with existing stored state
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ExErrorKind::Duplicate | ExErrorKind::ConstraintViolation
        )
    }
}

/// Canonical structured error type
///
/// Carries the classification plus whatever context the failing layer knew
/// (operation, aggregate id, type, table). The raw store error, when there
/// is one, is preserved as `cause` and exposed through
/// `std::error::Error::source`.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    type_name: Option<String>,
    table: Option<String>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<ExError>>,
    cause: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            type_name: None,
            table: None,
            request_id: None,
            message: String::new(),
            source: None,
            cause: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add aggregate id context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add type name context
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Add table context
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add a wrapped higher-level error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Attach the raw error this one was classified from
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the wrapped higher-level error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Get the raw error this one was classified from, if any
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {:?}", self.code(), self.kind)?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(type_name) = &self.type_name {
            write!(f, " (type: {})", type_name)?;
        }
        if let Some(table) = &self.table {
            write!(f, " (table: {})", table)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Some(cause) = &self.cause {
            let cause: &(dyn std::error::Error + 'static) = &**cause;
            return Some(cause);
        }
        self.source
            .as_deref()
            .map(|s| s as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Failures raised while analysing descriptors, generating schemas, and
/// mapping graphs to rows
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    // ===== Descriptor Errors =====
    /// A referenced type name has no descriptor
    #[error("Type not found: {type_name}")]
    UnresolvedType {
        type_name: String,
        referenced_by: Option<String>,
    },

    /// The analysis root has no identity field
    #[error("Aggregate root {type_name} has no identity field")]
    RootWithoutIdentity { type_name: String },

    /// An identity field is not a non-nullable primitive
    #[error("Invalid identity field {type_name}.{field}: {reason}")]
    InvalidIdentity {
        type_name: String,
        field: String,
        reason: String,
    },

    /// A value object refers back to itself
    #[error("Value object cycle through {type_name}.{field}")]
    ValueObjectCycle { type_name: String, field: String },

    /// A value object field cannot be embedded
    #[error("Field {type_name}.{field} cannot be embedded: {reason}")]
    UnsupportedValueObjectField {
        type_name: String,
        field: String,
        reason: String,
    },

    /// An entity used as a collection element has more than one owner
    #[error("Entity {type_name} has more than one owning edge: {owners:?}")]
    AmbiguousOwnership {
        type_name: String,
        owners: Vec<String>,
    },

    /// An `on_delete` override that the field cannot carry
    #[error("Invalid on_delete override on {type_name}.{field}: {reason}")]
    InvalidCascade {
        type_name: String,
        field: String,
        reason: String,
    },

    /// Map keys must be text, integer or guid
    #[error("Unsupported map key type on {type_name}.{field}")]
    UnsupportedMapKey { type_name: String, field: String },

    // ===== Schema Errors =====
    /// Two columns of one table share a name
    #[error("Duplicate column {column} in table {table}")]
    DuplicateColumn { table: String, column: String },

    /// Two tables share a name
    #[error("Duplicate table {table}")]
    DuplicateTable { table: String },

    /// Foreign keys between generated tables form a cycle
    #[error("Foreign key cycle between tables: {tables:?}")]
    TableCycle { tables: Vec<String> },

    /// Lookup of a table the schema does not contain
    #[error("Table not found in schema: {table}")]
    UnknownTable { table: String },

    // ===== Mapping Errors =====
    /// A non-nullable field is missing or null
    #[error("Missing value for {table}.{field}")]
    MissingField { table: String, field: String },

    /// A JSON value does not fit its column
    #[error("Value for {column} does not fit {expected:?}: {found}")]
    TypeMismatch {
        column: String,
        expected: StorageType,
        found: String,
    },

    /// A graph node has the wrong JSON shape (object, array, scalar)
    #[error("Expected {expected} for {table}.{field}, found {found}")]
    UnexpectedShape {
        table: String,
        field: String,
        expected: &'static str,
        found: String,
    },

    /// A GUID could not be parsed or decoded
    #[error("Invalid GUID: {value}")]
    InvalidGuid { value: String },

    /// A timestamp could not be parsed as RFC 3339
    #[error("Invalid timestamp: {value}")]
    InvalidTimestamp { value: String },

    /// The row set has no row for the root table
    #[error("No row in root table {table}")]
    MissingRootRow { table: String },

    /// The row set has more than one row for the root table
    #[error("Expected one row in root table {table}, found {count}")]
    MultipleRootRows { table: String, count: usize },

    /// One entity appears twice in a List or Map collection
    #[error("Entity {key} appears more than once in {table}")]
    RepeatedEntity { table: String, key: String },

    /// A foreign key value has no matching row in the row set
    #[error("Dangling reference {table}.{column}")]
    DanglingReference { table: String, column: String },

    /// JSON (de)serialization of a typed object failed
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl From<MappingError> for ExError {
    fn from(err: MappingError) -> Self {
        let message = err.to_string();
        let ex = match err {
            MappingError::UnresolvedType { type_name, .. } => {
                ExError::new(ExErrorKind::UnresolvedType).with_type_name(type_name)
            }

            MappingError::RootWithoutIdentity { type_name }
            | MappingError::InvalidIdentity { type_name, .. }
            | MappingError::UnsupportedValueObjectField { type_name, .. }
            | MappingError::InvalidCascade { type_name, .. }
            | MappingError::UnsupportedMapKey { type_name, .. } => {
                ExError::new(ExErrorKind::InvalidDescriptor).with_type_name(type_name)
            }

            MappingError::DuplicateColumn { table, .. }
            | MappingError::DuplicateTable { table }
            | MappingError::UnknownTable { table } => {
                ExError::new(ExErrorKind::InvalidDescriptor).with_table(table)
            }

            MappingError::ValueObjectCycle { type_name, .. } => {
                ExError::new(ExErrorKind::CycleDetected).with_type_name(type_name)
            }

            MappingError::TableCycle { .. } => ExError::new(ExErrorKind::CycleDetected),

            MappingError::AmbiguousOwnership { type_name, .. } => {
                ExError::new(ExErrorKind::AmbiguousOwnership).with_type_name(type_name)
            }

            MappingError::MissingField { table, .. }
            | MappingError::UnexpectedShape { table, .. }
            | MappingError::RepeatedEntity { table, .. }
            | MappingError::DanglingReference { table, .. } => {
                ExError::new(ExErrorKind::InvalidGraph).with_table(table)
            }

            MappingError::TypeMismatch { .. }
            | MappingError::InvalidGuid { .. }
            | MappingError::InvalidTimestamp { .. } => ExError::new(ExErrorKind::InvalidGraph),

            MappingError::MissingRootRow { table } => {
                ExError::new(ExErrorKind::NotFound).with_table(table)
            }

            MappingError::MultipleRootRows { table, .. } => {
                ExError::new(ExErrorKind::Internal).with_table(table)
            }

            MappingError::Serialization { .. } => ExError::new(ExErrorKind::Serialization),
        };
        ex.with_message(message)
    }
}
