//! Logging initialization: console plus daily-rolling file output.

use crate::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str =
    "streamsift=info,sift_engine=info,debrid=info,indexers=info,relname=warn,sqlx=warn";

/// Initialize the global subscriber.
///
/// Returns the appender guard; keep it alive for the process lifetime or the
/// file layer silently stops flushing.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "streamsift.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()
        .map_err(|e| crate::Error::Other(format!("failed to install subscriber: {e}")))?;

    Ok(guard)
}
