//! Search coordination: dedup of concurrent identical searches and short-TTL
//! sharing of scraper output across services.

use crate::config::CoordinatorConfig;
use crate::error::EngineError;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use release_types::{ReleaseCandidate, StreamKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Identifies one in-flight aggregation: concurrent calls with the same key
/// share a single execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoordinationKey {
    pub service: String,
    pub kind: StreamKind,
    pub id: String,
    pub config_summary: String,
}

/// Identifies scraper output reusable across services for a short window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShareKey {
    pub kind: StreamKind,
    pub id: String,
    pub config_summary: String,
}

type SharedSearch<T> = Shared<BoxFuture<'static, Result<T, Arc<EngineError>>>>;

struct ShareEntry {
    results: Arc<Vec<ReleaseCandidate>>,
    expires_at: Instant,
}

struct CoordState<T: Clone> {
    in_flight: HashMap<CoordinationKey, SharedSearch<T>>,
    shares: HashMap<ShareKey, ShareEntry>,
}

/// Process-wide coordinator. `T` is the (cheaply cloneable) outcome of one
/// coordinated search, typically an `Arc` of the admitted list.
pub struct SearchCoordinator<T: Clone + Send + Sync + 'static> {
    config: CoordinatorConfig,
    state: Mutex<CoordState<T>>,
    shutdown: CancellationToken,
}

impl<T: Clone + Send + Sync + 'static> SearchCoordinator<T> {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CoordState {
                in_flight: HashMap::new(),
                shares: HashMap::new(),
            }),
            shutdown: CancellationToken::new(),
        }
    }

    /// Execute (or join) a coordinated search.
    ///
    /// The first caller for a key installs the search future; every
    /// concurrent caller with the same key awaits the same future and
    /// receives the same result or error. The entry is evicted on settle.
    pub async fn execute_search<F>(
        &self,
        key: CoordinationKey,
        do_search: F,
    ) -> Result<T, Arc<EngineError>>
    where
        F: FnOnce(CancellationToken) -> BoxFuture<'static, Result<T, EngineError>>,
    {
        let (shared, owner) = {
            let mut state = self.state.lock();
            if let Some(existing) = state.in_flight.get(&key) {
                debug!(service = %key.service, id = %key.id, "joining in-flight search");
                (existing.clone(), false)
            } else {
                let cancel = CancellationToken::new();
                let timeout = self.config.search_timeout;
                let inner = do_search(cancel.clone());
                let wrapped = async move {
                    match tokio::time::timeout(timeout, inner).await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(err)) => Err(Arc::new(err)),
                        Err(_) => {
                            // Hard deadline: fire the root signal so scrapers
                            // and driver calls abort promptly.
                            cancel.cancel();
                            Err(Arc::new(EngineError::SearchTimeout { timeout }))
                        }
                    }
                }
                .boxed()
                .shared();
                state.in_flight.insert(key.clone(), wrapped.clone());
                (wrapped, true)
            }
        };

        let result = shared.clone().await;

        // The owner always evicts on settle; joiners additionally evict on
        // error so a failed search never satisfies later callers. Only the
        // exact future we awaited is evicted, never a newer same-key search.
        if owner || result.is_err() {
            let mut state = self.state.lock();
            if state
                .in_flight
                .get(&key)
                .is_some_and(|current| current.ptr_eq(&shared))
            {
                state.in_flight.remove(&key);
            }
        }
        result
    }

    /// Scraper output shared by an earlier service within the TTL window.
    pub fn shared_scrape(&self, key: &ShareKey) -> Option<Arc<Vec<ReleaseCandidate>>> {
        let state = self.state.lock();
        state
            .shares
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.results.clone())
    }

    /// Publish scraper output for reuse by other services.
    pub fn store_scrape(&self, key: ShareKey, results: Arc<Vec<ReleaseCandidate>>) {
        let mut state = self.state.lock();
        state.shares.insert(
            key,
            ShareEntry {
                results,
                expires_at: Instant::now() + self.config.share_ttl,
            },
        );
        Self::enforce_share_bounds(&mut state.shares, self.config.share_cap);
    }

    fn enforce_share_bounds(shares: &mut HashMap<ShareKey, ShareEntry>, cap: usize) {
        let now = Instant::now();
        shares.retain(|_, entry| entry.expires_at > now);
        while shares.len() > cap {
            let oldest = shares
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    shares.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Spawn the periodic sweep removing expired share entries.
    pub fn start_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(coordinator.config.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = coordinator.shutdown.cancelled() => {
                        debug!("coordinator sweep shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let mut state = coordinator.state.lock();
                        let before = state.shares.len();
                        Self::enforce_share_bounds(&mut state.shares, coordinator.config.share_cap);
                        let swept = before - state.shares.len();
                        if swept > 0 {
                            debug!(swept, "swept expired scraper shares");
                        }
                    }
                }
            }
        })
    }

    /// Cancel the sweep and drop both maps.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let mut state = self.state.lock();
        if !state.in_flight.is_empty() {
            warn!(
                pending = state.in_flight.len(),
                "dropping in-flight search entries at shutdown"
            );
        }
        state.in_flight.clear();
        state.shares.clear();
    }

    #[cfg(test)]
    pub(crate) fn share_len(&self) -> usize {
        self.state.lock().shares.len()
    }

    #[cfg(test)]
    pub(crate) fn in_flight_len(&self) -> usize {
        self.state.lock().in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn key(service: &str) -> CoordinationKey {
        CoordinationKey {
            service: service.to_string(),
            kind: StreamKind::Series,
            id: "tt0001:2:5".to_string(),
            config_summary: "default".to_string(),
        }
    }

    fn share_key() -> ShareKey {
        ShareKey {
            kind: StreamKind::Series,
            id: "tt0001:2:5".to_string(),
            config_summary: "default".to_string(),
        }
    }

    #[tokio::test]
    async fn concurrent_searches_share_one_execution() {
        let coordinator = SearchCoordinator::new(CoordinatorConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let search = |calls: Arc<AtomicUsize>| {
            move |_cancel: CancellationToken| {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(Arc::new(vec!["result".to_string()]))
                }
                .boxed()
            }
        };

        let (a, b) = tokio::join!(
            coordinator.execute_search(key("svc"), search(calls.clone())),
            coordinator.execute_search(key("svc"), search(calls.clone())),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(coordinator.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn different_services_do_not_join() {
        let coordinator = SearchCoordinator::new(CoordinatorConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let make = |calls: Arc<AtomicUsize>| {
            move |_cancel: CancellationToken| {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(Vec::<String>::new()))
                }
                .boxed()
            }
        };

        let (a, b) = tokio::join!(
            coordinator.execute_search(key("svc-a"), make(calls.clone())),
            coordinator.execute_search(key("svc-b"), make(calls.clone())),
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_propagate_to_every_joiner_and_evict() {
        let coordinator: SearchCoordinator<Arc<Vec<String>>> =
            SearchCoordinator::new(CoordinatorConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = |calls: Arc<AtomicUsize>| {
            move |_c: CancellationToken| {
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Err(EngineError::internal("boom"))
                }
                .boxed()
            }
        };

        let (a, b) = tokio::join!(
            coordinator.execute_search(key("svc"), failing(calls.clone())),
            coordinator.execute_search(key("svc"), failing(calls.clone())),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(a.is_err());
        assert!(b.is_err());
        assert_eq!(coordinator.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn timeout_fires_root_signal() {
        let coordinator: SearchCoordinator<Arc<()>> = SearchCoordinator::new(CoordinatorConfig {
            search_timeout: Duration::from_millis(30),
            ..CoordinatorConfig::default()
        });
        let cancelled = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let cancelled_in = cancelled.clone();

        let result = coordinator
            .execute_search(key("svc"), move |cancel| {
                // A scraper task outliving the coordinated future must still
                // observe the root signal.
                tokio::spawn(async move {
                    cancel.cancelled().await;
                    cancelled_in.store(true, Ordering::SeqCst);
                });
                async move {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(Arc::new(()))
                }
                .boxed()
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(&*err, EngineError::SearchTimeout { .. }));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn share_entries_expire_and_respect_cap() {
        let coordinator: SearchCoordinator<Arc<()>> = SearchCoordinator::new(CoordinatorConfig {
            share_ttl: Duration::from_millis(30),
            share_cap: 2,
            ..CoordinatorConfig::default()
        });

        coordinator.store_scrape(share_key(), Arc::new(vec![]));
        assert!(coordinator.shared_scrape(&share_key()).is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(coordinator.shared_scrape(&share_key()).is_none());

        for i in 0..4 {
            coordinator.store_scrape(
                ShareKey {
                    kind: StreamKind::Movie,
                    id: format!("tt{i}"),
                    config_summary: "default".to_string(),
                },
                Arc::new(vec![]),
            );
        }
        assert!(coordinator.share_len() <= 2);
    }
}
