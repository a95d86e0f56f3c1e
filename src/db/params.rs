//! Turns a [`Statement`] into a bound sqlx query for each driver.
//!
//! Binds borrow from the statement, so the same statement can be replayed
//! against a pool or a pinned transaction without cloning its parameters.

use crate::models::{QueryParam, Statement};
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{MySql, Postgres, Sqlite};

macro_rules! bound_query {
    ($(#[$meta:meta])* $name:ident, $db:ty, $args:ty) => {
        $(#[$meta])*
        pub(crate) fn $name(stmt: &Statement) -> Query<'_, $db, $args> {
            stmt.params
                .iter()
                .fold(sqlx::query(&stmt.sql), |query, param| match param {
                    // Typed as text; every driver accepts a NULL text bind
                    QueryParam::Null => query.bind(None::<String>),
                    QueryParam::Bool(v) => query.bind(*v),
                    QueryParam::Int(v) => query.bind(*v),
                    QueryParam::Float(v) => query.bind(*v),
                    QueryParam::String(v) => query.bind(v.as_str()),
                    QueryParam::Bytes(v) => query.bind(v.as_slice()),
                })
        }
    };
}

bound_query!(
    /// MySQL query with `?` placeholders bound in order.
    mysql_query,
    MySql,
    MySqlArguments
);
bound_query!(
    /// PostgreSQL query with `$n` placeholders bound in order.
    postgres_query,
    Postgres,
    PgArguments
);
bound_query!(sqlite_query, Sqlite, SqliteArguments<'_>);
