//! Connection collaborator interface
//!
//! Implementations classify raw store failures into `ExErrorKind` before
//! returning, and must enable foreign-key enforcement when opening.

use crate::errors::ExResult;
use crate::model::{Row, Statement};

/// Statement execution inside an open unit of work
pub trait Session {
    /// Run a statement, returning the number of affected rows
    ///
    /// # Errors
    ///
    /// Classified store failure.
    fn execute(&self, statement: &Statement) -> ExResult<usize>;

    /// Run a query, returning rows keyed by result column name
    ///
    /// # Errors
    ///
    /// Classified store failure.
    fn query(&self, statement: &Statement) -> ExResult<Vec<Row>>;
}

/// A connection able to run one atomic unit of work at a time
pub trait Connection {
    /// Run `work` in a transaction; commit on `Ok`, roll back on `Err`
    ///
    /// # Errors
    ///
    /// The error returned by `work`, or a classified failure to begin or
    /// commit.
    fn transaction<T, F>(&mut self, work: F) -> ExResult<T>
    where
        F: FnOnce(&dyn Session) -> ExResult<T>;

    /// Run read-only `work` in a transaction that does not take the write
    /// lock up front
    ///
    /// Defaults to [`transaction`](Self::transaction).
    ///
    /// # Errors
    ///
    /// As [`transaction`](Self::transaction).
    fn read_transaction<T, F>(&mut self, work: F) -> ExResult<T>
    where
        F: FnOnce(&dyn Session) -> ExResult<T>,
    {
        self.transaction(work)
    }
}
