//! Database layer.
//!
//! - `engine`: one connection pool with its role tag and counters
//! - `group`: master/slave routing over a set of engines
//! - `selector`: slave selection policies
//! - `metrics`: per-call recorder hook
//! - `transaction`: transactions pinned to one connection
//! - `executor`, `params`, `types`: per-driver execution, binding and decoding
//! - `macros`: database dispatch macros for reducing code duplication

pub mod engine;
pub mod executor;
pub mod group;
#[macro_use]
pub mod macros;
pub mod metrics;
pub mod params;
pub mod selector;
pub mod transaction;
pub mod types;

pub use engine::{DbPool, Engine, EngineSettings, EngineStats, Role};
pub use group::EngineGroup;
pub use metrics::{MetricsRecorder, NoopRecorder, TracingRecorder};
pub use selector::{LeastConnSelector, RandomSelector, RoundRobinSelector, SlaveSelector};
pub use transaction::EngineTransaction;
