//! Canonical schema constants for structured logging
//!
//! These keys are shared by the logging macros, the executor, and the test
//! capture layer so that assertions never depend on ad-hoc field names.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";

// Mapping identifiers
pub const FIELD_ROOT_TYPE: &str = "root_type";
pub const FIELD_AGGREGATE_ID: &str = "aggregate_id";
pub const FIELD_TABLE: &str = "table";

// Sizes
pub const FIELD_STATEMENT_COUNT: &str = "statement_count";
pub const FIELD_ROW_COUNT: &str = "row_count";
pub const FIELD_TABLE_COUNT: &str = "table_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_distinct() {
        assert_ne!(EVENT_START, EVENT_END);
        assert_ne!(EVENT_START, EVENT_END_ERROR);
        assert_ne!(EVENT_END, EVENT_END_ERROR);
    }

    #[test]
    fn test_field_keys_are_distinct() {
        let keys = [
            FIELD_COMPONENT,
            FIELD_OP,
            FIELD_EVENT,
            FIELD_DURATION_MS,
            FIELD_REQUEST_ID,
            FIELD_ROOT_TYPE,
            FIELD_AGGREGATE_ID,
            FIELD_TABLE,
            FIELD_STATEMENT_COUNT,
            FIELD_ROW_COUNT,
            FIELD_TABLE_COUNT,
            FIELD_ERR_KIND,
            FIELD_ERR_CODE,
        ];
        let unique: std::collections::HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
    }
}
