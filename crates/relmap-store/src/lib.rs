//! relmap store - SQLite persistence and catalog loading
//!
//! Provides:
//! - Connection opening with foreign-key enforcement and busy timeout
//! - `SqliteConnection`, the rusqlite implementation of the core
//!   `Connection` / `Session` interfaces
//! - Classification of rusqlite failures into `ExErrorKind`
//! - YAML descriptor catalog parser (format v0)

#![allow(clippy::result_large_err)]

pub mod catalog;
pub mod db;
pub mod errors;
pub mod sqlite;

pub use catalog::{parse_catalog_file, parse_catalog_str, Catalog};
pub use db::StoreConfig;
pub use errors::Result;
pub use sqlite::SqliteConnection;
