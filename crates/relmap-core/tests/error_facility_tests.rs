#![allow(clippy::unwrap_used, clippy::expect_used)]

use relmap_core::errors::{ExError, ExErrorKind, MappingError};
use relmap_core::model::StorageType;
use relmap_core_types::RequestId;

#[test]
fn test_mapping_errors_classify() {
    let cases: Vec<(MappingError, ExErrorKind)> = vec![
        (
            MappingError::UnresolvedType {
                type_name: "Ghost".into(),
                referenced_by: None,
            },
            ExErrorKind::UnresolvedType,
        ),
        (
            MappingError::ValueObjectCycle {
                type_name: "Node".into(),
                field: "next".into(),
            },
            ExErrorKind::CycleDetected,
        ),
        (
            MappingError::AmbiguousOwnership {
                type_name: "Player".into(),
                owners: vec![],
            },
            ExErrorKind::AmbiguousOwnership,
        ),
        (
            MappingError::TypeMismatch {
                column: "quantity".into(),
                expected: StorageType::Integer64,
                found: "\"two\"".into(),
            },
            ExErrorKind::InvalidGraph,
        ),
        (
            MappingError::MissingRootRow {
                table: "orders".into(),
            },
            ExErrorKind::NotFound,
        ),
        (
            MappingError::Serialization {
                message: "bad".into(),
            },
            ExErrorKind::Serialization,
        ),
    ];

    for (err, kind) in cases {
        let rendered = err.to_string();
        let ex: ExError = err.into();
        assert_eq!(ex.kind(), kind);
        assert_eq!(ex.message(), rendered);
    }
}

#[test]
fn test_context_survives_builders() {
    let request_id = RequestId::from_string("req-1");
    let err = ExError::new(ExErrorKind::Timeout)
        .with_op("save")
        .with_entity_id("abc")
        .with_request_id(request_id.clone());

    assert_eq!(err.op(), Some("save"));
    assert_eq!(err.entity_id(), Some("abc"));
    assert_eq!(err.request_id(), Some(&request_id));
    assert_eq!(err.code(), "ERR_TIMEOUT");
}

#[test]
fn test_wrapped_source_chain() {
    let inner = ExError::new(ExErrorKind::ConnectionFailure).with_message("socket closed");
    let outer = ExError::new(ExErrorKind::Unknown).with_source(inner);

    let source = std::error::Error::source(&outer).expect("source");
    assert!(source.to_string().contains("ERR_CONNECTION_FAILURE"));
    assert_eq!(
        outer.source_error().map(|e| e.kind()),
        Some(ExErrorKind::ConnectionFailure)
    );
}
