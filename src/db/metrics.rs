//! Per-call metrics hook.
//!
//! The group reports every routed call as `(operation, role, elapsed)`.
//! Recording is fire-and-forget: a recorder cannot fail the call it observes.

use crate::db::engine::Role;
use std::time::Duration;
use tracing::debug;

/// Sink for routed-call measurements.
///
/// Implementations must not block; they run inline on the calling task.
pub trait MetricsRecorder: Send + Sync {
    fn record(&self, operation: &str, role: Role, elapsed: Duration);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {
    fn record(&self, _operation: &str, _role: Role, _elapsed: Duration) {}
}

/// Emits one `debug` event per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl MetricsRecorder for TracingRecorder {
    fn record(&self, operation: &str, role: Role, elapsed: Duration) {
        debug!(
            operation = operation,
            role = %role,
            elapsed_us = elapsed.as_micros() as u64,
            "engine group call"
        );
    }
}
