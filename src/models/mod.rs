//! Data models for dbgroup.
//!
//! This module re-exports all model types used throughout the crate.

pub mod descriptor;
pub mod query;

// Re-export commonly used types
pub use descriptor::{ConnectionDescriptor, DatabaseType};
pub use query::{ColumnMetadata, ExecResult, QueryParam, QueryResult, Row, Statement};
