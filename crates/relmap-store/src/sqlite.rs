//! rusqlite implementation of the core connection interfaces

use std::path::Path;

use relmap_core::connection::{Connection, Session};
use relmap_core::errors::ExResult;
use relmap_core::model::{Row, SqlValue, Statement};
use relmap_core_types::Sensitive;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, TransactionBehavior};

use crate::db::{self, StoreConfig};
use crate::errors::{from_rusqlite, Result};

fn to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Real(r) => Value::Real(*r),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Blob(b) => Value::Blob(b.clone()),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(r) => SqlValue::Real(r),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    }
}

/// A configured SQLite connection
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Open and configure a file database
    pub fn open<P: AsRef<Path>>(path: P, config: &StoreConfig) -> Result<Self> {
        let conn = db::open(path)?;
        Self::from_connection(conn, config)
    }

    /// Open a configured in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = db::open_in_memory()?;
        // WAL does not apply to memory databases
        let config = StoreConfig {
            wal: false,
            ..StoreConfig::default()
        };
        Self::from_connection(conn, &config)
    }

    /// Wrap an existing rusqlite connection, applying `config`
    pub fn from_connection(conn: rusqlite::Connection, config: &StoreConfig) -> Result<Self> {
        db::configure(&conn, config)?;
        Ok(Self { conn })
    }

    /// The underlying rusqlite connection
    pub fn raw(&self) -> &rusqlite::Connection {
        &self.conn
    }
}

impl SqliteConnection {
    fn run_in<T, F>(&mut self, behavior: TransactionBehavior, work: F) -> ExResult<T>
    where
        F: FnOnce(&dyn Session) -> ExResult<T>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(behavior)
            .map_err(|e| from_rusqlite(e).with_op("begin"))?;

        let session = SqliteSession { conn: &tx };
        match work(&session) {
            Ok(value) => {
                tx.commit().map_err(|e| from_rusqlite(e).with_op("commit"))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

impl Connection for SqliteConnection {
    /// IMMEDIATE: the write lock is taken at BEGIN, so lock waits happen
    /// before any statement runs
    fn transaction<T, F>(&mut self, work: F) -> ExResult<T>
    where
        F: FnOnce(&dyn Session) -> ExResult<T>,
    {
        self.run_in(TransactionBehavior::Immediate, work)
    }

    /// DEFERRED: takes only a read lock, so loads do not queue behind writers
    fn read_transaction<T, F>(&mut self, work: F) -> ExResult<T>
    where
        F: FnOnce(&dyn Session) -> ExResult<T>,
    {
        self.run_in(TransactionBehavior::Deferred, work)
    }
}

/// Statement execution on an open transaction
pub struct SqliteSession<'c> {
    conn: &'c rusqlite::Connection,
}

impl Session for SqliteSession<'_> {
    fn execute(&self, statement: &Statement) -> ExResult<usize> {
        tracing::debug!(
            sql = %statement.sql,
            params = ?Sensitive::new(&statement.params),
            "execute"
        );
        let mut stmt = self
            .conn
            .prepare_cached(&statement.sql)
            .map_err(from_rusqlite)?;
        stmt.execute(params_from_iter(statement.params.iter().map(to_sqlite)))
            .map_err(from_rusqlite)
    }

    fn query(&self, statement: &Statement) -> ExResult<Vec<Row>> {
        tracing::debug!(
            sql = %statement.sql,
            params = ?Sensitive::new(&statement.params),
            "query"
        );
        let mut stmt = self
            .conn
            .prepare_cached(&statement.sql)
            .map_err(from_rusqlite)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt
            .query(params_from_iter(statement.params.iter().map(to_sqlite)))
            .map_err(from_rusqlite)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(from_rusqlite)? {
            let mut record = Row::new();
            for (i, name) in columns.iter().enumerate() {
                let value = row.get_ref(i).map_err(from_rusqlite)?;
                record.insert(name.clone(), from_sqlite(value));
            }
            out.push(record);
        }
        Ok(out)
    }
}
