//! Driver dispatch for [`DbPool`](crate::db::engine::DbPool).

/// Expands to a `match` over the `DbPool` variants, one arm per driver.
///
/// Each arm binds the concrete sqlx pool so its body can call driver-typed
/// code; bodies may `.await` inside an async fn.
///
/// ```ignore
/// let idle = impl_db_dispatch!(&engine.pool, {
///     MySql(p) => p.num_idle(),
///     Postgres(p) => p.num_idle(),
///     SQLite(p) => p.num_idle(),
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $pool {
            $(
                $crate::db::engine::DbPool::$variant($p) => $body,
            )+
        }
    };
}
