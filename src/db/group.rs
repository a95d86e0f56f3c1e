//! Engine groups: one master plus any number of read replicas.
//!
//! Writes (`exec`, `insert`, `update`, `delete`) always run on master.
//! Reads (`query`, `find`, `get`) run on a slave picked by the group's
//! [`SlaveSelector`] among the slaves that are not closed; with no live slave
//! they run on master. Selection happens per call, never per session.
//!
//! There is no ordering guarantee between a write on master and a later read
//! on a slave (replication lag). Callers needing read-after-write consistency
//! read through [`EngineGroup::master`].

use crate::db::engine::{Engine, EngineStats, Role};
use crate::db::metrics::{MetricsRecorder, NoopRecorder};
use crate::db::selector::{RandomSelector, SlaveSelector};
use crate::db::transaction::EngineTransaction;
use crate::error::{CloseFailure, DbError, DbResult};
use crate::models::{ConnectionDescriptor, ExecResult, QueryResult, Row, Statement};
use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

const GROUP_NAME: &str = "engine group";

/// A master engine and its slaves behind one query/exec surface.
pub struct EngineGroup {
    master: Arc<Engine>,
    slaves: Vec<Arc<Engine>>,
    selector: Arc<dyn SlaveSelector>,
    recorder: Arc<dyn MetricsRecorder>,
    closed: AtomicBool,
}

impl std::fmt::Debug for EngineGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineGroup")
            .field("master", &self.master.name())
            .field(
                "slaves",
                &self.slaves.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("selector", &self.selector)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl EngineGroup {
    /// Compose a group from opened engines. Slaves may be empty.
    ///
    /// # Errors
    ///
    /// [`DbError::Configuration`] when the master engine is already closed.
    pub fn new(master: Arc<Engine>, slaves: Vec<Arc<Engine>>) -> DbResult<Self> {
        if master.is_closed() {
            return Err(DbError::configuration(format!(
                "master engine '{}' is closed",
                master.name()
            )));
        }

        info!(
            master = %master.name(),
            slaves = slaves.len(),
            "Created engine group"
        );

        Ok(Self {
            master,
            slaves,
            selector: Arc::new(RandomSelector::new()),
            recorder: Arc::new(NoopRecorder),
            closed: AtomicBool::new(false),
        })
    }

    /// Compose a group from a list whose first engine is the master.
    ///
    /// # Errors
    ///
    /// [`DbError::Configuration`] when the list is empty.
    pub fn from_engines(engines: Vec<Arc<Engine>>) -> DbResult<Self> {
        let mut engines = engines.into_iter();
        let master = engines
            .next()
            .ok_or_else(|| DbError::configuration("no master engine supplied"))?;
        Self::new(master, engines.collect())
    }

    /// Open every descriptor and compose the result.
    ///
    /// If any engine fails to open, the ones already opened are closed and
    /// the error is returned.
    pub async fn open(
        master: &ConnectionDescriptor,
        slaves: &[ConnectionDescriptor],
    ) -> DbResult<Self> {
        let master = Arc::new(Engine::open(master, Role::Master).await?);

        let mut opened: Vec<Arc<Engine>> = Vec::with_capacity(slaves.len());
        for (idx, descriptor) in slaves.iter().enumerate() {
            match Engine::open(descriptor, Role::Slave).await {
                Ok(engine) => opened.push(Arc::new(engine)),
                Err(e) => {
                    warn!(
                        slave = idx,
                        endpoint = %descriptor.display_name(),
                        error = %e,
                        "Failed to open slave, closing opened engines"
                    );
                    for engine in std::iter::once(&master).chain(opened.iter()) {
                        if let Err(close_err) = engine.close().await {
                            warn!(engine = %engine.name(), error = %close_err, "Close failed");
                        }
                    }
                    return Err(e);
                }
            }
        }

        Self::new(master, opened)
    }

    /// Replace the slave selection policy.
    pub fn with_selector(mut self, selector: Arc<dyn SlaveSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Report every routed call to `recorder`.
    pub fn with_recorder(mut self, recorder: Arc<dyn MetricsRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// The master engine, for forced routing.
    pub fn master(&self) -> Arc<Engine> {
        Arc::clone(&self.master)
    }

    /// A slave chosen by the same policy reads use; master when none is live.
    pub fn slave(&self) -> Arc<Engine> {
        self.read_target().0
    }

    /// All slaves in registration order, closed ones included.
    pub fn slaves(&self) -> &[Arc<Engine>] {
        &self.slaves
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn query(&self, stmt: &Statement) -> DbResult<QueryResult> {
        self.ensure_open()?;
        let (engine, role) = self.read_target();
        self.observe("query", role, engine.query(stmt)).await
    }

    /// All matching rows.
    pub async fn find(&self, stmt: &Statement) -> DbResult<Vec<Row>> {
        self.ensure_open()?;
        let (engine, role) = self.read_target();
        self.observe("find", role, async { engine.query(stmt).await.map(|r| r.rows) })
            .await
    }

    /// First matching row.
    pub async fn get(&self, stmt: &Statement) -> DbResult<Option<Row>> {
        self.ensure_open()?;
        let (engine, role) = self.read_target();
        self.observe("get", role, engine.get(stmt)).await
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub async fn exec(&self, stmt: &Statement) -> DbResult<ExecResult> {
        self.write("exec", stmt).await
    }

    pub async fn insert(&self, stmt: &Statement) -> DbResult<ExecResult> {
        self.write("insert", stmt).await
    }

    pub async fn update(&self, stmt: &Statement) -> DbResult<ExecResult> {
        self.write("update", stmt).await
    }

    pub async fn delete(&self, stmt: &Statement) -> DbResult<ExecResult> {
        self.write("delete", stmt).await
    }

    /// Begin a transaction pinned to one master connection.
    pub async fn begin(&self) -> DbResult<EngineTransaction> {
        self.ensure_open()?;
        self.observe("begin", Role::Master, self.master.begin()).await
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Close master, then every slave in registration order.
    ///
    /// Every engine is attempted even when an earlier one fails; all
    /// failures come back together in [`DbError::PartialClose`]. A second
    /// call returns [`DbError::AlreadyClosed`].
    pub async fn close(&self) -> DbResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(DbError::already_closed(GROUP_NAME));
        }

        let mut failures = Vec::new();
        let engines = std::iter::once(("master".to_string(), &self.master)).chain(
            self.slaves
                .iter()
                .enumerate()
                .map(|(idx, slave)| (format!("slave[{idx}]"), slave)),
        );

        for (label, engine) in engines {
            if let Err(error) = engine.close().await {
                warn!(
                    engine = %engine.name(),
                    position = %label,
                    error = %error,
                    "Failed to close engine"
                );
                failures.push(CloseFailure {
                    engine: format!("{label} {}", engine.name()),
                    error,
                });
            }
        }

        if failures.is_empty() {
            info!(engines = 1 + self.slaves.len(), "Closed engine group");
            Ok(())
        } else {
            Err(DbError::PartialClose { failures })
        }
    }

    /// Stats for master followed by each slave.
    pub fn stats(&self) -> Vec<EngineStats> {
        std::iter::once(&self.master)
            .chain(self.slaves.iter())
            .map(|engine| engine.stats())
            .collect()
    }

    // ------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------

    fn read_target(&self) -> (Arc<Engine>, Role) {
        let live: Cow<'_, [Arc<Engine>]> = if self.slaves.iter().all(|s| !s.is_closed()) {
            Cow::Borrowed(self.slaves.as_slice())
        } else {
            Cow::Owned(
                self.slaves
                    .iter()
                    .filter(|s| !s.is_closed())
                    .cloned()
                    .collect(),
            )
        };

        if live.is_empty() {
            debug!(master = %self.master.name(), "No live slave, reading from master");
            return (Arc::clone(&self.master), Role::Master);
        }

        let idx = self.selector.select(&live);
        match live.get(idx) {
            Some(slave) => {
                debug!(slave = %slave.name(), index = idx, "Routing read to slave");
                (Arc::clone(slave), Role::Slave)
            }
            None => {
                warn!(
                    index = idx,
                    live = live.len(),
                    selector = ?self.selector,
                    "Selector index out of range, reading from master"
                );
                (Arc::clone(&self.master), Role::Master)
            }
        }
    }

    async fn write(&self, operation: &'static str, stmt: &Statement) -> DbResult<ExecResult> {
        self.ensure_open()?;
        self.observe(operation, Role::Master, self.master.exec(stmt)).await
    }

    async fn observe<T>(
        &self,
        operation: &str,
        role: Role,
        call: impl Future<Output = DbResult<T>>,
    ) -> DbResult<T> {
        let start = Instant::now();
        let result = call.await;
        self.recorder.record(operation, role, start.elapsed());
        result
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.is_closed() {
            return Err(DbError::already_closed(GROUP_NAME));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn lazy_engine(host: &str, role: Role) -> Arc<Engine> {
        let desc = ConnectionDescriptor::mysql(host, 1, "root", "root", "test");
        Arc::new(Engine::open(&desc, role).await.unwrap())
    }

    #[tokio::test]
    async fn test_from_engines_requires_master() {
        let err = EngineGroup::from_engines(Vec::new()).unwrap_err();
        assert!(matches!(err, DbError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_closed_master_is_rejected() {
        let master = lazy_engine("db-0", Role::Master).await;
        master.close().await.unwrap();
        let err = EngineGroup::new(master, Vec::new()).unwrap_err();
        assert!(matches!(err, DbError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_slave_falls_back_to_master() {
        let master = lazy_engine("db-0", Role::Master).await;
        let group = EngineGroup::new(Arc::clone(&master), Vec::new()).unwrap();
        assert!(Arc::ptr_eq(&group.slave(), &master));

        let slave = lazy_engine("db-1", Role::Slave).await;
        let group = EngineGroup::new(Arc::clone(&master), vec![Arc::clone(&slave)]).unwrap();
        assert!(Arc::ptr_eq(&group.slave(), &slave));

        slave.close().await.unwrap();
        assert!(Arc::ptr_eq(&group.slave(), &master));
    }

    #[tokio::test]
    async fn test_stats_lists_master_first() {
        let group = EngineGroup::from_engines(vec![
            lazy_engine("db-0", Role::Master).await,
            lazy_engine("db-1", Role::Slave).await,
            lazy_engine("db-2", Role::Slave).await,
        ])
        .unwrap();

        let stats = group.stats();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].role, Role::Master);
        assert_eq!(stats[0].name, "db-0:1/test");
        assert_eq!(stats[2].name, "db-2:1/test");
        group.close().await.unwrap();
    }
}
