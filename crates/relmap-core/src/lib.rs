//! relmap core - relational mapping of aggregate object graphs
//!
//! Pipeline, leaves first:
//! - [`analysis`]: walk a root's descriptor graph, break cycles
//! - [`classify`]: assign AggregateRoot / Entity / ValueObject roles
//! - [`schema`]: tables, columns, foreign keys, creation order, DDL
//! - [`mapping`]: flatten graphs to rows and reconstruct them
//! - [`query`]: load, persist, delete and create statements
//!
//! Execution against a store lives in `relmap-engine`; this crate only
//! defines the [`connection::Connection`] seam it runs through.

#![allow(clippy::result_large_err)]

pub mod analysis;
pub mod classify;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod errors;
pub mod logging_facility;
pub mod mapping;
pub mod model;
pub mod query;
pub mod schema;

pub use analysis::{analyze, GraphAnalysis};
pub use classify::classify;
pub use config::MappingConfig;
pub use connection::{Connection, Session};
pub use dialect::{Dialect, SqliteDialect};
pub use errors::{ExError, ExErrorKind, ExResult, MappingError, Result};
pub use mapping::RelationalMapper;
pub use model::{NestedGraph, Role, RoleMap, Row, RowSet, SqlValue, Statement, TypeCatalog};
pub use schema::Schema;
