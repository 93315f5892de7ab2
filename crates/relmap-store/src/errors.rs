//! Error handling for relmap-store
//!
//! Classifies raw rusqlite failures into core `ExErrorKind`s, keeping the
//! original error as the cause.

use relmap_core::errors::{ExError, ExErrorKind};
use rusqlite::ffi;
use rusqlite::ErrorCode;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a catalog validation error
pub fn catalog_validation(reason: &str) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op("catalog_parse")
        .with_message(reason.to_string())
}

fn classify(err: &rusqlite::Error) -> ExErrorKind {
    match err {
        rusqlite::Error::SqliteFailure(code, _) => match code.code {
            ErrorCode::ConstraintViolation => match code.extended_code {
                ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    ExErrorKind::Duplicate
                }
                _ => ExErrorKind::ConstraintViolation,
            },
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => ExErrorKind::Timeout,
            ErrorCode::CannotOpen
            | ErrorCode::SystemIoFailure
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::PermissionDenied
            | ErrorCode::ReadOnly => ExErrorKind::ConnectionFailure,
            _ => ExErrorKind::Unknown,
        },
        rusqlite::Error::QueryReturnedNoRows => ExErrorKind::NotFound,
        rusqlite::Error::InvalidPath(_) => ExErrorKind::ConnectionFailure,
        _ => ExErrorKind::Unknown,
    }
}

/// Create a classified error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(classify(&err))
        .with_op("sqlite")
        .with_message(err.to_string())
        .with_cause(err)
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
        .with_cause(err)
}
