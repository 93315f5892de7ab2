//! Leaf value conversion between graph JSON and storage values

use serde_json::{Number, Value};

use crate::dialect::Dialect;
use crate::errors::{MappingError, Result};
use crate::model::{ColumnDefinition, SqlValue, StorageType};

fn describe(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() > 40 {
        rendered.chars().take(40).collect::<String>() + "..."
    } else {
        rendered
    }
}

fn mismatch(column: &ColumnDefinition, found: String) -> MappingError {
    MappingError::TypeMismatch {
        column: column.name.clone(),
        expected: column.storage_type,
        found,
    }
}

/// Convert a graph leaf into the value stored in `column`
///
/// # Errors
///
/// `TypeMismatch` when the JSON type does not fit the column, or the
/// dialect's GUID / timestamp parse error.
pub fn encode(value: &Value, column: &ColumnDefinition, dialect: &dyn Dialect) -> Result<SqlValue> {
    let encoded = match (column.storage_type, value) {
        (_, Value::Null) => SqlValue::Null,
        (StorageType::Guid16, Value::String(s)) => dialect.encode_guid(s)?,
        (StorageType::Text, Value::String(s)) => SqlValue::Text(s.clone()),
        (StorageType::TimestampText, Value::String(s)) => dialect.encode_timestamp(s)?,
        (StorageType::Integer64, Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => return Err(mismatch(column, describe(value))),
        },
        // -0.0 and 0.0 compare equal in UNIQUE constraints; store one form
        (StorageType::Float64, Value::Number(n)) => match n.as_f64() {
            Some(f) if f == 0.0 => SqlValue::Real(0.0),
            Some(f) => SqlValue::Real(f),
            None => return Err(mismatch(column, describe(value))),
        },
        (StorageType::Boolean, Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        _ => return Err(mismatch(column, describe(value))),
    };
    Ok(encoded)
}

/// Convert a stored value back into a graph leaf
///
/// # Errors
///
/// `TypeMismatch` when the stored value does not fit the column.
pub fn decode(value: &SqlValue, column: &ColumnDefinition, dialect: &dyn Dialect) -> Result<Value> {
    let decoded = match (column.storage_type, value) {
        (_, SqlValue::Null) => Value::Null,
        (StorageType::Guid16, v) => Value::String(dialect.decode_guid(v)?),
        (StorageType::TimestampText, v) => Value::String(dialect.decode_timestamp(v)?),
        (StorageType::Text, SqlValue::Text(s)) => Value::String(s.clone()),
        (StorageType::Integer64, SqlValue::Integer(i)) => Value::from(*i),
        (StorageType::Float64, SqlValue::Real(f)) => Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| mismatch(column, f.to_string()))?,
        // REAL affinity can hand back whole numbers as integers
        (StorageType::Float64, SqlValue::Integer(i)) => Number::from_f64(*i as f64)
            .map(Value::Number)
            .ok_or_else(|| mismatch(column, i.to_string()))?,
        (StorageType::Boolean, SqlValue::Integer(0)) => Value::Bool(false),
        (StorageType::Boolean, SqlValue::Integer(1)) => Value::Bool(true),
        (_, other) => return Err(mismatch(column, other.type_label().to_string())),
    };
    Ok(decoded)
}

/// Encode a map key; integer keys may arrive as JSON object keys (text)
///
/// # Errors
///
/// As [`encode`], plus `TypeMismatch` for null keys.
pub fn encode_key(key: &Value, column: &ColumnDefinition, dialect: &dyn Dialect) -> Result<SqlValue> {
    match (column.storage_type, key) {
        (_, Value::Null) => Err(mismatch(column, "null".to_string())),
        (StorageType::Integer64, Value::String(s)) => s
            .parse::<i64>()
            .map(SqlValue::Integer)
            .map_err(|_| mismatch(column, describe(key))),
        _ => encode(key, column, dialect),
    }
}

/// Decode a stored map key into the text used as JSON object key
///
/// # Errors
///
/// As [`decode`].
pub fn decode_key(value: &SqlValue, column: &ColumnDefinition, dialect: &dyn Dialect) -> Result<String> {
    match decode(value, column, dialect)? {
        Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

/// Encode then decode: the form a leaf takes after a store round trip
///
/// # Errors
///
/// As [`encode`] and [`decode`].
pub fn normalize(value: &Value, column: &ColumnDefinition, dialect: &dyn Dialect) -> Result<Value> {
    decode(&encode(value, column, dialect)?, column, dialect)
}
