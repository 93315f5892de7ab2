//! Redaction wrapper for row values
//!
//! Statement parameters carry user data. They are only ever handed to
//! `tracing` wrapped in `Sensitive<T>`, whose `Debug`/`Display` output is a
//! shape summary (e.g. `<redacted: 4 values>`) rather than the data itself.

use std::fmt;

/// Describes the shape of a value without revealing its content
pub trait RedactionSummary {
    fn summary(&self) -> String;
}

impl<T> RedactionSummary for [T] {
    fn summary(&self) -> String {
        match self.len() {
            1 => "1 value".to_string(),
            n => format!("{} values", n),
        }
    }
}

impl<T> RedactionSummary for Vec<T> {
    fn summary(&self) -> String {
        self.as_slice().summary()
    }
}

impl RedactionSummary for str {
    fn summary(&self) -> String {
        format!("{} bytes", self.len())
    }
}

impl RedactionSummary for String {
    fn summary(&self) -> String {
        self.as_str().summary()
    }
}

impl<T: RedactionSummary + ?Sized> RedactionSummary for &T {
    fn summary(&self) -> String {
        (**self).summary()
    }
}

/// Wrapper that redacts itself in `Debug` and `Display`
///
/// ```
/// use relmap_core_types::Sensitive;
///
/// let params = vec!["alice@example.com", "hunter2"];
/// assert_eq!(format!("{:?}", Sensitive::new(&params)), "<redacted: 2 values>");
/// ```
pub struct Sensitive<T>(T);

impl<T> Sensitive<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Access the wrapped value
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: RedactionSummary> fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted: {}>", self.0.summary())
    }
}

impl<T: RedactionSummary> fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
