use std::collections::BTreeMap;

/// A storage-level value as exchanged with a connection
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Blob(_) => "blob",
        }
    }

    /// Stable text rendering used for dedupe keys and logs
    pub fn key_text(&self) -> String {
        match self {
            SqlValue::Null => "null".to_string(),
            SqlValue::Integer(i) => format!("i:{}", i),
            SqlValue::Real(r) if *r == 0.0 => "r:0".to_string(),
            SqlValue::Real(r) => format!("r:{}", r),
            SqlValue::Text(s) => format!("t:{}", s),
            SqlValue::Blob(b) => format!("b:{}", hex::encode(b)),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

/// Column name to value
pub type Row = BTreeMap<String, SqlValue>;

/// Generic nested in-memory graph exchanged with the domain layer
pub type NestedGraph = serde_json::Map<String, serde_json::Value>;

/// Table name to rows, in insertion order per table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    tables: BTreeMap<String, Vec<Row>>,
}

impl RowSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, table: impl Into<String>, row: Row) {
        self.tables.entry(table.into()).or_default().push(row);
    }

    pub fn extend(&mut self, table: &str, rows: impl IntoIterator<Item = Row>) {
        self.tables.entry(table.to_string()).or_default().extend(rows);
    }

    /// Rows of one table; empty when the table has none
    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `table` already holds a row with `column == value`
    pub fn contains(&self, table: &str, column: &str, value: &SqlValue) -> bool {
        self.rows(table).iter().any(|r| r.get(column) == Some(value))
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &[Row])> {
        self.tables.iter().map(|(t, rows)| (t.as_str(), rows.as_slice()))
    }

    pub fn row_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}

/// SQL text with positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Statement without parameters
    pub fn plain(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
}
