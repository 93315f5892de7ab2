//! SQL dialect capability

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::errors::{MappingError, Result};
use crate::model::{SqlValue, StorageType};

/// Token-level SQL differences between stores
pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Column type name for a storage class
    fn type_name(&self, storage: StorageType) -> &'static str;

    /// Placeholder for the 1-based parameter `index`
    fn placeholder(&self, index: usize) -> String;

    fn quote_identifier(&self, ident: &str) -> String;

    fn encode_guid(&self, value: &str) -> Result<SqlValue>;

    /// Decode to the lowercase hyphenated form
    fn decode_guid(&self, value: &SqlValue) -> Result<String>;

    fn encode_timestamp(&self, value: &str) -> Result<SqlValue>;

    fn decode_timestamp(&self, value: &SqlValue) -> Result<String>;
}

/// SQLite: GUIDs as 16-byte blobs, timestamps as UTC RFC 3339 text
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

fn parse_guid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| MappingError::InvalidGuid {
        value: value.to_string(),
    })
}

fn normalize_timestamp(value: &str) -> Result<String> {
    let parsed = DateTime::parse_from_rfc3339(value).map_err(|_| MappingError::InvalidTimestamp {
        value: value.to_string(),
    })?;
    Ok(parsed
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn type_name(&self, storage: StorageType) -> &'static str {
        match storage {
            StorageType::Guid16 => "BLOB",
            StorageType::Text | StorageType::TimestampText => "TEXT",
            StorageType::Integer64 | StorageType::Boolean => "INTEGER",
            StorageType::Float64 => "REAL",
        }
    }

    fn placeholder(&self, index: usize) -> String {
        format!("?{}", index)
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn encode_guid(&self, value: &str) -> Result<SqlValue> {
        Ok(SqlValue::Blob(parse_guid(value)?.as_bytes().to_vec()))
    }

    fn decode_guid(&self, value: &SqlValue) -> Result<String> {
        match value {
            SqlValue::Blob(bytes) => Uuid::from_slice(bytes)
                .map(|u| u.to_string())
                .map_err(|_| MappingError::InvalidGuid {
                    value: hex::encode(bytes),
                }),
            SqlValue::Text(text) => parse_guid(text).map(|u| u.to_string()),
            other => Err(MappingError::InvalidGuid {
                value: other.type_label().to_string(),
            }),
        }
    }

    fn encode_timestamp(&self, value: &str) -> Result<SqlValue> {
        normalize_timestamp(value).map(SqlValue::Text)
    }

    fn decode_timestamp(&self, value: &SqlValue) -> Result<String> {
        match value {
            SqlValue::Text(text) => normalize_timestamp(text),
            other => Err(MappingError::InvalidTimestamp {
                value: other.type_label().to_string(),
            }),
        }
    }
}
