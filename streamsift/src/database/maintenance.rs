//! TTL janitor for the stream cache.

use crate::database::store::StreamCacheStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Periodically removes expired cache rows.
pub struct CacheSweeper {
    store: Arc<dyn StreamCacheStore>,
    interval: Duration,
}

impl CacheSweeper {
    pub fn new(store: Arc<dyn StreamCacheStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Spawn the sweep loop; it stops when `shutdown` fires.
    pub fn start(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so startup does not
            // race the migration.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("cache sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.store.sweep_expired().await {
                            Ok(0) => debug!("cache sweep found nothing to remove"),
                            Ok(removed) => info!(removed, "swept expired cache rows"),
                            Err(err) => error!(error = %err, "cache sweep failed"),
                        }
                    }
                }
            }
        })
    }
}
