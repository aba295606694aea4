//! Scenarios for the `capped-demo` binary
//!
//! Each scenario builds a few in-process capped event logs, drives them and
//! returns a serializable report. The binary prints the report; the tests
//! assert on it.

pub mod scenarios;

pub use scenarios::{OverflowReport, PruneReport, ReplicationReport};
