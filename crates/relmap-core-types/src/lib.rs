//! Core types shared across relmap facilities
//!
//! This crate provides foundational types used by both the error
//! facility and the logging facility:
//!
//! - **Correlation types**: RequestId for tying log events and errors to one call
//! - **Sensitive data**: Sensitive<T> marker that keeps row values out of logs
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;
pub mod sensitive;

pub use correlation::RequestId;
pub use sensitive::{RedactionSummary, Sensitive};
