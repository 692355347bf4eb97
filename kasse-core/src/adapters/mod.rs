//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for storage
//! - Polling, line and channel readers for the `CardReader` port
//! - Tracing and broadcast reporters for the `ResultReporter` port

pub mod duckdb;
pub mod reader;
pub mod reporter;
