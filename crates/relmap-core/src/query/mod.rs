//! SQL statement construction for load, persist, delete and schema creation

pub mod builder;
pub mod load;

pub use builder::{
    build_create_schema, build_delete, build_delete_by_keys, build_fetch_by_keys, build_persist,
    build_upsert, persist_statements, FETCH_BATCH,
};
pub use load::{build_load, JoinedTable, LoadQuery};
