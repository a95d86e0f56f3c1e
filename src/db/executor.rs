//! Statement execution.
//!
//! The per-driver functions here are generic over `sqlx::Executor`, so the
//! same code serves a pool (any free connection) and a pinned transaction
//! connection (`&mut *tx`).
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific fetch and execute
//! - `postgres`: PostgreSQL-specific fetch and execute
//! - `sqlite`: SQLite-specific fetch and execute
//!
//! Each submodule provides identical functionality adapted to the database's type system.

use crate::db::types::{DecodeOptions, RowToJson};
use crate::error::{DbError, DbResult};
use crate::models::{ExecResult, QueryResult, Statement};
use futures_util::TryStreamExt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Run `fut` under the caller's deadline, if one was given.
///
/// Dropping the future on expiry cancels the pending acquire or network wait.
pub(crate) async fn with_deadline<T, F>(
    deadline: Option<Duration>,
    operation: &str,
    fut: F,
) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    match deadline {
        None => fut.await,
        Some(limit) => match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(DbError::timeout(operation, limit.as_millis() as u64)),
        },
    }
}

/// Decode fetched rows into a [`QueryResult`].
pub(crate) fn to_query_result<R: RowToJson>(
    rows: Vec<R>,
    opts: DecodeOptions,
    start: Instant,
) -> QueryResult {
    let columns = rows
        .first()
        .map(|r| r.get_column_metadata())
        .unwrap_or_default();
    let rows = rows.iter().map(|r| r.to_json_map(opts)).collect();

    QueryResult {
        columns,
        rows,
        execution_time_ms: start.elapsed().as_millis() as u64,
    }
}

/// Build an [`ExecResult`] from driver counters.
pub(crate) fn to_exec_result(
    (rows_affected, last_insert_id): (u64, Option<i64>),
    start: Instant,
) -> ExecResult {
    ExecResult {
        rows_affected,
        last_insert_id,
        execution_time_ms: start.elapsed().as_millis() as u64,
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// When a statement carries no parameters it is sent as raw SQL, avoiding the
// prepared-statement path (some statements such as CREATE PROCEDURE can't be
// prepared).

pub(crate) mod mysql {
    use super::*;
    use crate::db::params::mysql_query;
    use sqlx::mysql::MySqlRow;
    use sqlx::{Executor, MySql};

    pub async fn fetch<'c, E>(executor: E, stmt: &'c Statement) -> Result<Vec<MySqlRow>, sqlx::Error>
    where
        E: Executor<'c, Database = MySql> + 'c,
    {
        if stmt.params.is_empty() {
            return executor.fetch(stmt.sql.as_str()).try_collect().await;
        }
        mysql_query(stmt).fetch(executor).try_collect().await
    }

    pub async fn execute<'c, E>(executor: E, stmt: &'c Statement) -> Result<(u64, Option<i64>), sqlx::Error>
    where
        E: Executor<'c, Database = MySql> + 'c,
    {
        let result = if stmt.params.is_empty() {
            executor.execute(stmt.sql.as_str()).await?
        } else {
            mysql_query(stmt).execute(executor).await?
        };

        let last_insert_id = i64::try_from(result.last_insert_id())
            .ok()
            .filter(|id| *id > 0);
        Ok((result.rows_affected(), last_insert_id))
    }
}

pub(crate) mod postgres {
    use super::*;
    use crate::db::params::postgres_query;
    use sqlx::postgres::PgRow;
    use sqlx::{Executor, Postgres};

    pub async fn fetch<'c, E>(executor: E, stmt: &'c Statement) -> Result<Vec<PgRow>, sqlx::Error>
    where
        E: Executor<'c, Database = Postgres> + 'c,
    {
        if stmt.params.is_empty() {
            return executor.fetch(stmt.sql.as_str()).try_collect().await;
        }
        postgres_query(stmt).fetch(executor).try_collect().await
    }

    /// PostgreSQL has no insert id; use `RETURNING` through `query` instead.
    pub async fn execute<'c, E>(executor: E, stmt: &'c Statement) -> Result<(u64, Option<i64>), sqlx::Error>
    where
        E: Executor<'c, Database = Postgres> + 'c,
    {
        let result = if stmt.params.is_empty() {
            executor.execute(stmt.sql.as_str()).await?
        } else {
            postgres_query(stmt).execute(executor).await?
        };
        Ok((result.rows_affected(), None))
    }
}

pub(crate) mod sqlite {
    use super::*;
    use crate::db::params::sqlite_query;
    use sqlx::sqlite::SqliteRow;
    use sqlx::{Executor, Sqlite};

    pub async fn fetch<'c, E>(executor: E, stmt: &'c Statement) -> Result<Vec<SqliteRow>, sqlx::Error>
    where
        E: Executor<'c, Database = Sqlite> + 'c,
    {
        if stmt.params.is_empty() {
            return executor.fetch(stmt.sql.as_str()).try_collect().await;
        }
        sqlite_query(stmt).fetch(executor).try_collect().await
    }

    pub async fn execute<'c, E>(executor: E, stmt: &'c Statement) -> Result<(u64, Option<i64>), sqlx::Error>
    where
        E: Executor<'c, Database = Sqlite> + 'c,
    {
        let result = if stmt.params.is_empty() {
            executor.execute(stmt.sql.as_str()).await?
        } else {
            sqlite_query(stmt).execute(executor).await?
        };

        let last_insert_id = Some(result.last_insert_rowid()).filter(|id| *id > 0);
        Ok((result.rows_affected(), last_insert_id))
    }
}
