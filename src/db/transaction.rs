//! Transactions pinned to a single pooled connection.
//!
//! Every statement of an [`EngineTransaction`] runs on the connection that
//! began it. Dropping the transaction without committing rolls it back.

use crate::db::engine::{EngineSettings, Role};
use crate::db::executor::{self, to_exec_result, to_query_result, with_deadline};
use crate::error::DbResult;
use crate::models::{DatabaseType, ExecResult, QueryResult, Row, Statement};
use sqlx::{MySql, Postgres, Sqlite, Transaction};
use std::time::Instant;
use tracing::debug;

/// Database-specific transaction wrapper.
pub(crate) enum DbTransaction {
    MySql(Transaction<'static, MySql>),
    Postgres(Transaction<'static, Postgres>),
    SQLite(Transaction<'static, Sqlite>),
}

impl DbTransaction {
    fn db_type(&self) -> DatabaseType {
        match self {
            DbTransaction::MySql(_) => DatabaseType::MySQL,
            DbTransaction::Postgres(_) => DatabaseType::PostgreSQL,
            DbTransaction::SQLite(_) => DatabaseType::SQLite,
        }
    }

    async fn commit(self) -> Result<(), sqlx::Error> {
        match self {
            DbTransaction::MySql(tx) => tx.commit().await,
            DbTransaction::Postgres(tx) => tx.commit().await,
            DbTransaction::SQLite(tx) => tx.commit().await,
        }
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        match self {
            DbTransaction::MySql(tx) => tx.rollback().await,
            DbTransaction::Postgres(tx) => tx.rollback().await,
            DbTransaction::SQLite(tx) => tx.rollback().await,
        }
    }
}

/// An open transaction on one engine.
pub struct EngineTransaction {
    tx: DbTransaction,
    role: Role,
    settings: EngineSettings,
}

impl std::fmt::Debug for EngineTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineTransaction")
            .field("engine", &self.settings.name)
            .field("role", &self.role)
            .field("db_type", &self.tx.db_type())
            .finish()
    }
}

impl EngineTransaction {
    pub(crate) fn new(tx: DbTransaction, role: Role, settings: EngineSettings) -> Self {
        Self { tx, role, settings }
    }

    /// Role of the engine this transaction is pinned to.
    pub fn role(&self) -> Role {
        self.role
    }

    pub async fn query(&mut self, stmt: &Statement) -> DbResult<QueryResult> {
        let start = Instant::now();
        let opts = self.settings.decode_options();
        let settings = &self.settings;
        let tx = &mut self.tx;

        let result = with_deadline(stmt.timeout, "query", async move {
            let fetched = match tx {
                DbTransaction::MySql(tx) => executor::mysql::fetch(&mut **tx, stmt)
                    .await
                    .map(|rows| to_query_result(rows, opts, start)),
                DbTransaction::Postgres(tx) => executor::postgres::fetch(&mut **tx, stmt)
                    .await
                    .map(|rows| to_query_result(rows, opts, start)),
                DbTransaction::SQLite(tx) => executor::sqlite::fetch(&mut **tx, stmt)
                    .await
                    .map(|rows| to_query_result(rows, opts, start)),
            };
            fetched.map_err(|e| settings.driver_error(e))
        })
        .await;

        self.settings.log_statement(self.role, stmt, start.elapsed());
        result
    }

    pub async fn get(&mut self, stmt: &Statement) -> DbResult<Option<Row>> {
        Ok(self.query(stmt).await?.into_first())
    }

    pub async fn exec(&mut self, stmt: &Statement) -> DbResult<ExecResult> {
        let start = Instant::now();
        let settings = &self.settings;
        let tx = &mut self.tx;

        let result = with_deadline(stmt.timeout, "exec", async move {
            let executed = match tx {
                DbTransaction::MySql(tx) => executor::mysql::execute(&mut **tx, stmt).await,
                DbTransaction::Postgres(tx) => executor::postgres::execute(&mut **tx, stmt).await,
                DbTransaction::SQLite(tx) => executor::sqlite::execute(&mut **tx, stmt).await,
            };
            executed
                .map(|counts| to_exec_result(counts, start))
                .map_err(|e| settings.driver_error(e))
        })
        .await;

        self.settings.log_statement(self.role, stmt, start.elapsed());
        result
    }

    pub async fn commit(self) -> DbResult<()> {
        let name = self.settings.name.clone();
        self.tx
            .commit()
            .await
            .map_err(|e| self.settings.driver_error(e))?;
        debug!(engine = %name, "Transaction committed");
        Ok(())
    }

    pub async fn rollback(self) -> DbResult<()> {
        let name = self.settings.name.clone();
        self.tx
            .rollback()
            .await
            .map_err(|e| self.settings.driver_error(e))?;
        debug!(engine = %name, "Transaction rolled back");
        Ok(())
    }
}
