//! dbgroup - Main entry point.
//!
//! Opens a master/slave engine group, runs one statement through it (as a
//! read, or as a write with `--write`), prints the result and per-engine
//! stats as JSON, then closes every engine.

use dbgroup::config::Config;
use dbgroup::db::{EngineGroup, TracingRecorder};
use dbgroup::models::Statement;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    info!(
        selector = %config.selector,
        slaves = config.slaves.len(),
        "Starting dbgroup v{}",
        env!("CARGO_PKG_VERSION")
    );

    let master = config.master_descriptor()?;
    let slaves = config.slave_descriptors()?;

    let group = EngineGroup::open(&master, &slaves)
        .await?
        .with_selector(config.selector.build())
        .with_recorder(Arc::new(TracingRecorder));

    let stmt = Statement::new(config.sql.as_str()).timeout(config.timeout_duration());

    let outcome = if config.write {
        group.exec(&stmt).await.map(|r| json!({ "exec": r }))
    } else {
        group
            .query(&stmt)
            .await
            .map(|r| json!({ "columns": r.columns, "rows": r.rows }))
    };

    // Pools are released before the outcome is reported
    let stats = group.stats();
    let closed = group.close().await;

    match outcome {
        Ok(mut output) => {
            output["stats"] = json!(stats);
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Err(e) => {
            error!(error = %e, "Statement failed");
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Hint: {suggestion}");
            }
            return Err(e.into());
        }
    }

    if let Err(e) = closed {
        error!(error = %e, "Failed to close engine group");
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}
