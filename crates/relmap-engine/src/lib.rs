//! relmap engine - Orchestration layer
//!
//! Coordinates schema compilation, mapping and statement execution:
//! - `MappingRegistry` compiles each aggregate root once and caches the
//!   analysis, roles and schema
//! - `TransactionalExecutor` runs create_schema / save / load / delete as
//!   single units of work against any `Connection`
//!
//! ## Logging Ownership
//!
//! The engine layer owns lifecycle logging: `log_op_start!` at entry,
//! `log_op_end!` on success, `log_op_error!` on failure. Lower layers (store,
//! core) use only `tracing::debug!()` for internal details.

#![allow(clippy::result_large_err)]

pub mod executor;
pub mod registry;

pub use executor::TransactionalExecutor;
pub use registry::{AggregateMapping, MappingRegistry};
