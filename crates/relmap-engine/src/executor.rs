//! Transactional execution of aggregate operations
//!
//! Every public operation:
//! - resolves the cached mapping for its root
//! - builds its whole statement sequence up front where it can
//! - runs inside exactly one `Connection::transaction`, so a failure at any
//!   statement rolls the unit of work back
//! - emits one start event and one end or end_error event

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use relmap_core::connection::{Connection, Session};
use relmap_core::errors::{ExError, ExErrorKind, ExResult};
use relmap_core::mapping::codec;
use relmap_core::model::{FieldBinding, NestedGraph, ReferenceTarget, Row, RowSet, SqlValue};
use relmap_core::query::{
    build_create_schema, build_delete, build_delete_by_keys, build_fetch_by_keys, build_load,
    persist_statements,
};
use relmap_core::schema::Schema;
use relmap_core::{log_op_end, log_op_error, log_op_start};
use relmap_core::{Dialect, MappingConfig, RelationalMapper, Statement, TypeCatalog};
use relmap_core_types::RequestId;
use relmap_store::Catalog;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::registry::{AggregateMapping, MappingRegistry};

/// Runs create_schema / save / load / delete for any aggregate root of a
/// catalog against a caller-supplied connection
pub struct TransactionalExecutor {
    registry: MappingRegistry,
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Attach the operation, request id and, unless already set, the entity id
fn annotate(err: ExError, op: &str, request_id: &RequestId, id: Option<&str>) -> ExError {
    let needs_id = err.entity_id().is_none();
    let err = err.with_op(op).with_request_id(request_id.clone());
    match id {
        Some(id) if needs_id => err.with_entity_id(id),
        _ => err,
    }
}

/// Text form of an id for logs and error context
fn id_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn run_all(session: &dyn Session, statements: &[Statement]) -> ExResult<usize> {
    let mut affected = 0;
    for statement in statements {
        affected += session.execute(statement)?;
    }
    Ok(affected)
}

/// Entity reference columns anywhere in a binding tree
fn entity_references(bindings: &[FieldBinding]) -> Vec<(&str, &str)> {
    let mut found = Vec::new();
    for binding in bindings {
        match binding {
            FieldBinding::Reference {
                column,
                target: ReferenceTarget::Entity { table },
                ..
            } => found.push((column.as_str(), table.as_str())),
            FieldBinding::Embedded { bindings, .. } => found.extend(entity_references(bindings)),
            _ => {}
        }
    }
    found
}

/// DELETEs for singular entity rows in `previous` that `current` no longer
/// holds, dependents first
///
/// Owned collection tables are skipped; their rows go with the owner.
fn prune_entities(
    schema: &Schema,
    previous: &RowSet,
    current: &RowSet,
    dialect: &dyn Dialect,
) -> Vec<Statement> {
    let tables: Vec<_> = schema.ordered_tables().collect();
    let mut statements = Vec::new();
    for table in tables.into_iter().rev() {
        if table.is_root || table.ownership.is_some() {
            continue;
        }
        let keys: Vec<SqlValue> = previous
            .rows(&table.table_name)
            .iter()
            .filter_map(|r| r.get(&table.primary_key))
            .filter(|k| !current.contains(&table.table_name, &table.primary_key, k))
            .cloned()
            .collect();
        statements.extend(build_delete_by_keys(
            table,
            &table.primary_key,
            &keys,
            dialect,
        ));
    }
    statements
}

/// Rows of one aggregate plus the number of statements spent fetching them
struct Fetched {
    rows: RowSet,
    statement_count: usize,
}

/// Load every row of the aggregate rooted at `id`
///
/// Starts from the root join, then follows entity references by primary key
/// and owned tables by owner column until no new rows turn up.
fn fetch_aggregate(
    session: &dyn Session,
    schema: &Schema,
    dialect: &dyn Dialect,
    id: &SqlValue,
) -> ExResult<Option<Fetched>> {
    let load = build_load(schema, id, dialect)?;
    let joined = session.query(&load.statement)?;
    if joined.is_empty() {
        return Ok(None);
    }

    let mut rows = load.split(&joined);
    let mut statement_count = 1;
    let mut pending: VecDeque<(String, Vec<Row>)> = rows
        .tables()
        .map(|(table, r)| (table.to_string(), r.to_vec()))
        .collect();

    while let Some((table_name, new_rows)) = pending.pop_front() {
        let table = schema.table(&table_name)?;

        for (column, target_name) in entity_references(&table.bindings) {
            let target = schema.table(target_name)?;
            let keys: Vec<SqlValue> = new_rows
                .iter()
                .filter_map(|r| r.get(column))
                .filter(|k| !k.is_null() && !rows.contains(target_name, &target.primary_key, k))
                .cloned()
                .collect();
            for statement in build_fetch_by_keys(target, &target.primary_key, &keys, dialect) {
                let fetched = session.query(&statement)?;
                statement_count += 1;
                absorb(&mut rows, &mut pending, target_name, &target.primary_key, fetched);
            }
        }

        let owner_keys: Vec<SqlValue> = new_rows
            .iter()
            .filter_map(|r| r.get(&table.primary_key))
            .cloned()
            .collect();
        let owned = schema.ordered_tables().filter(|t| {
            t.ownership
                .as_ref()
                .is_some_and(|own| own.owner_table == table_name)
        });
        for child in owned {
            let Some(own) = &child.ownership else {
                continue;
            };
            for statement in build_fetch_by_keys(child, &own.owner_column, &owner_keys, dialect) {
                let fetched = session.query(&statement)?;
                statement_count += 1;
                absorb(
                    &mut rows,
                    &mut pending,
                    &child.table_name,
                    &child.primary_key,
                    fetched,
                );
            }
        }
    }

    Ok(Some(Fetched {
        rows,
        statement_count,
    }))
}

/// Add rows not yet present and queue them for expansion
fn absorb(
    rows: &mut RowSet,
    pending: &mut VecDeque<(String, Vec<Row>)>,
    table: &str,
    primary_key: &str,
    fetched: Vec<Row>,
) {
    let mut added = Vec::new();
    for row in fetched {
        let known = row
            .get(primary_key)
            .is_some_and(|key| rows.contains(table, primary_key, key));
        if !known {
            rows.push(table, row.clone());
            added.push(row);
        }
    }
    if !added.is_empty() {
        pending.push_back((table.to_string(), added));
    }
}

impl TransactionalExecutor {
    pub fn new(catalog: TypeCatalog, config: MappingConfig, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            registry: MappingRegistry::new(catalog, config, dialect),
        }
    }

    /// Executor over a parsed catalog file
    pub fn from_catalog(catalog: Catalog, dialect: Arc<dyn Dialect>) -> Self {
        Self::new(catalog.types, catalog.mapping, dialect)
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    fn dialect(&self) -> &dyn Dialect {
        self.registry.dialect()
    }

    fn encode_id(&self, mapping: &AggregateMapping, id: &Value) -> ExResult<SqlValue> {
        if id.is_null() {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_type_name(&mapping.root)
                .with_message("aggregate id must not be null"));
        }
        let root = mapping.schema.root()?;
        let column = root.primary_key_column().ok_or_else(|| {
            ExError::new(ExErrorKind::Internal)
                .with_table(&root.table_name)
                .with_message("root table has no primary key column")
        })?;
        Ok(codec::encode(id, column, self.dialect())?)
    }

    /// Create every table of `root`'s schema, returning its fingerprint
    ///
    /// Idempotent: tables and indexes are created only if missing.
    ///
    /// # Errors
    ///
    /// Descriptor errors from compiling the root, or the classified store
    /// failure of the first failing statement.
    pub fn create_schema<C: Connection>(&self, conn: &mut C, root: &str) -> ExResult<String> {
        let request_id = RequestId::new();
        log_op_start!(
            "create_schema",
            request_id = request_id.as_str(),
            root_type = root
        );
        let start = Instant::now();

        let result = self
            .create_schema_impl(conn, root)
            .map_err(|e| annotate(e, "create_schema", &request_id, None))
            .map_err(|e| {
                log_op_error!("create_schema", &e, duration_ms = elapsed_ms(start));
                e
            })?;

        log_op_end!(
            "create_schema",
            duration_ms = elapsed_ms(start),
            table_count = result.1,
            fingerprint = result.0.as_str()
        );
        Ok(result.0)
    }

    fn create_schema_impl<C: Connection>(&self, conn: &mut C, root: &str) -> ExResult<(String, usize)> {
        let mapping = self.registry.mapping(root)?;
        let statements = build_create_schema(&mapping.schema, self.dialect());
        conn.transaction(|session| run_all(session, &statements))?;
        Ok((mapping.fingerprint.clone(), mapping.schema.tables.len()))
    }

    /// Persist `graph` as the aggregate `root`, replacing any saved state
    ///
    /// Collection rows of every saved owner are replaced wholesale; entity
    /// rows the previous version referenced and this one does not are
    /// deleted in the same transaction.
    ///
    /// # Errors
    ///
    /// Mapping errors for graphs that do not fit the descriptors, and
    /// classified store failures (e.g. `ConstraintViolation` for a
    /// reference to a missing aggregate). Nothing is written on error.
    pub fn save<C: Connection>(&self, conn: &mut C, root: &str, graph: &NestedGraph) -> ExResult<()> {
        let request_id = RequestId::new();
        log_op_start!("save", request_id = request_id.as_str(), root_type = root);
        let start = Instant::now();

        let result = self.save_impl(conn, root, graph).map_err(|e| {
            let e = annotate(e, "save", &request_id, None);
            log_op_error!("save", &e, duration_ms = elapsed_ms(start));
            e
        })?;

        log_op_end!(
            "save",
            duration_ms = elapsed_ms(start),
            aggregate_id = result.aggregate_id.as_str(),
            statement_count = result.statement_count,
            row_count = result.row_count
        );
        Ok(())
    }

    fn save_impl<C: Connection>(&self, conn: &mut C, root: &str, graph: &NestedGraph) -> ExResult<SaveReport> {
        let mapping = self.registry.mapping(root)?;
        let aggregate_id = graph
            .get(&mapping.identity_field)
            .map(id_text)
            .unwrap_or_default();

        let mapper = RelationalMapper::new(&mapping.schema, self.dialect());
        let rows = mapper
            .flatten(graph)
            .map_err(|e| ExError::from(e).with_entity_id(&aggregate_id))?;
        let schema = &mapping.schema;
        let dialect = self.dialect();
        let statements = persist_statements(&rows, schema, dialect)?;
        let root_table = schema.root()?;
        let root_key = rows
            .rows(&root_table.table_name)
            .first()
            .and_then(|r| r.get(&root_table.primary_key))
            .cloned()
            .unwrap_or(SqlValue::Null);

        let statement_count = conn
            .transaction(|session| {
                let previous = fetch_aggregate(session, schema, dialect, &root_key)?;
                run_all(session, &statements)?;

                // entity rows the new version no longer reaches
                let Some(previous) = previous else {
                    return Ok(statements.len() + 1);
                };
                let pruned = prune_entities(schema, &previous.rows, &rows, dialect);
                run_all(session, &pruned)?;
                Ok(previous.statement_count + statements.len() + pruned.len())
            })
            .map_err(|e| e.with_entity_id(&aggregate_id))?;

        Ok(SaveReport {
            aggregate_id,
            statement_count,
            row_count: rows.row_count(),
        })
    }

    /// Load the aggregate `root` with identity `id`
    ///
    /// # Errors
    ///
    /// `NotFound` when no root row has that id, mapping errors when stored
    /// rows cannot be decoded, classified store failures.
    pub fn load<C: Connection>(
        &self,
        conn: &mut C,
        root: &str,
        id: impl Into<Value>,
    ) -> ExResult<NestedGraph> {
        let id = id.into();
        let id_label = id_text(&id);
        let request_id = RequestId::new();
        log_op_start!(
            "load",
            request_id = request_id.as_str(),
            root_type = root,
            aggregate_id = id_label.as_str()
        );
        let start = Instant::now();

        let (graph, fetched) = self.load_impl(conn, root, &id).map_err(|e| {
            let e = annotate(e, "load", &request_id, Some(&id_label));
            log_op_error!("load", &e, duration_ms = elapsed_ms(start));
            e
        })?;

        log_op_end!(
            "load",
            duration_ms = elapsed_ms(start),
            statement_count = fetched.statement_count,
            row_count = fetched.rows.row_count()
        );
        Ok(graph)
    }

    fn load_impl<C: Connection>(
        &self,
        conn: &mut C,
        root: &str,
        id: &Value,
    ) -> ExResult<(NestedGraph, Fetched)> {
        let mapping = self.registry.mapping(root)?;
        let key = self.encode_id(&mapping, id)?;
        let dialect = self.dialect();

        let fetched = conn
            .read_transaction(|session| fetch_aggregate(session, &mapping.schema, dialect, &key))?
            .ok_or_else(|| not_found(&mapping))?;

        let graph = RelationalMapper::new(&mapping.schema, dialect).reconstruct(&fetched.rows)?;
        Ok((graph, fetched))
    }

    /// Delete the aggregate `root` with identity `id`
    ///
    /// Owned collection rows go by ON DELETE CASCADE; rows of singular
    /// entity references are swept in the same transaction.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `ConstraintViolation` when another
    /// aggregate still references this one through a Restrict reference.
    pub fn delete<C: Connection>(&self, conn: &mut C, root: &str, id: impl Into<Value>) -> ExResult<()> {
        let id = id.into();
        let id_label = id_text(&id);
        let request_id = RequestId::new();
        log_op_start!(
            "delete",
            request_id = request_id.as_str(),
            root_type = root,
            aggregate_id = id_label.as_str()
        );
        let start = Instant::now();

        let statement_count = self.delete_impl(conn, root, &id).map_err(|e| {
            let e = annotate(e, "delete", &request_id, Some(&id_label));
            log_op_error!("delete", &e, duration_ms = elapsed_ms(start));
            e
        })?;

        log_op_end!(
            "delete",
            duration_ms = elapsed_ms(start),
            statement_count = statement_count
        );
        Ok(())
    }

    fn delete_impl<C: Connection>(&self, conn: &mut C, root: &str, id: &Value) -> ExResult<usize> {
        let mapping = self.registry.mapping(root)?;
        let key = self.encode_id(&mapping, id)?;
        let dialect = self.dialect();
        let schema = &mapping.schema;

        conn.transaction(|session| {
            let fetched = fetch_aggregate(session, schema, dialect, &key)?
                .ok_or_else(|| not_found(&mapping))?;

            let mut statements = vec![build_delete(schema, &key, dialect)?];
            statements.extend(prune_entities(schema, &fetched.rows, &RowSet::new(), dialect));

            run_all(session, &statements)?;
            Ok(fetched.statement_count + statements.len())
        })
    }

    /// Serialize `object` with serde and save it as `root`
    ///
    /// # Errors
    ///
    /// `Serialization` when the object does not serialize to a JSON object,
    /// otherwise as [`save`](Self::save).
    pub fn save_object<C: Connection, T: Serialize>(
        &self,
        conn: &mut C,
        root: &str,
        object: &T,
    ) -> ExResult<()> {
        match serde_json::to_value(object) {
            Ok(Value::Object(graph)) => self.save(conn, root, &graph),
            Ok(other) => {
                let message = format!("expected an object, found {}", kind_of(&other));
                Err(serialization_error("save_object", root, message))
            }
            Err(e) => Err(serialization_error("save_object", root, e.to_string())),
        }
    }

    /// Load `root` and deserialize it with serde
    ///
    /// # Errors
    ///
    /// As [`load`](Self::load), plus `Serialization` when the graph does
    /// not deserialize into `T`.
    pub fn load_object<C: Connection, T: DeserializeOwned>(
        &self,
        conn: &mut C,
        root: &str,
        id: impl Into<Value>,
    ) -> ExResult<T> {
        let graph = self.load(conn, root, id)?;
        serde_json::from_value(Value::Object(graph))
            .map_err(|e| serialization_error("load_object", root, e.to_string()))
    }
}

struct SaveReport {
    aggregate_id: String,
    statement_count: usize,
    row_count: usize,
}

fn not_found(mapping: &AggregateMapping) -> ExError {
    ExError::new(ExErrorKind::NotFound)
        .with_type_name(&mapping.root)
        .with_table(&mapping.schema.root_table)
        .with_message("no saved aggregate with this id")
}

fn serialization_error(op: &str, root: &str, message: String) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op(op)
        .with_type_name(root)
        .with_message(message)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
