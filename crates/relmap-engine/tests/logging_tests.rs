#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use relmap_core::logging_facility::init_test_capture;
use relmap_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};

// Single test in this binary: the capture is process-wide
#[test]
fn test_operation_boundaries_are_logged() {
    let capture = init_test_capture();
    let (executor, mut conn) = setup();
    capture.clear();

    executor.save(&mut conn, "Order", &order_graph()).unwrap();
    executor.load(&mut conn, "Order", ORDER_ID).unwrap();
    let _ = executor.load(&mut conn, "Order", "99999999-9999-4999-8999-999999999999");

    let saves = capture.filter(|e| e.op() == Some("save"));
    assert_eq!(saves.len(), 2);
    assert_eq!(saves[0].event(), Some(EVENT_START));
    assert_eq!(saves[0].field("root_type"), Some("Order"));
    assert_eq!(saves[1].event(), Some(EVENT_END));
    assert_eq!(saves[1].field("aggregate_id"), Some(ORDER_ID));
    assert_eq!(saves[1].field("row_count"), Some("3"));
    assert!(saves[1].field("duration_ms").is_some());
    assert_eq!(saves[0].component(), Some("relmap_engine::executor"));

    let loads = capture.filter(|e| e.op() == Some("load"));
    assert_eq!(loads.len(), 4);
    assert_eq!(
        capture.count_events(|e| e.op() == Some("load") && e.event() == Some(EVENT_START)),
        2
    );
    let failure = capture.filter(|e| e.event() == Some(EVENT_END_ERROR));
    assert_eq!(failure.len(), 1);
    assert_eq!(failure[0].field("err_code"), Some("ERR_NOT_FOUND"));

    // Row values never reach the log
    assert!(capture
        .events()
        .iter()
        .flat_map(|e| e.fields.values())
        .all(|v| !v.contains("EUR")));
}
