//! dbgroup library
//!
//! Master/slave database engine groups over sqlx pools (MySQL, PostgreSQL,
//! SQLite). Writes go to the master engine; reads go to a slave picked per
//! call by a pluggable selector, or to master when no slave is live.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use db::{Engine, EngineGroup, Role};
pub use error::{DbError, DbResult};
pub use models::{ConnectionDescriptor, Statement};
