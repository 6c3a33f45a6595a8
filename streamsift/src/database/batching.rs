//! Background write coalescing for admission records.
//!
//! The facade enqueues records as requests finish; a worker flushes them to
//! the store in batches, either when the buffer fills or on a timer, so
//! request latency never includes a database write.

use crate::database::models::CacheRecord;
use crate::database::store::StreamCacheStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct WriteBufferConfig {
    pub max_buffer_size: usize,
    pub flush_interval: Duration,
}

impl Default for WriteBufferConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: 200,
            flush_interval: Duration::from_secs(5),
        }
    }
}

/// Handle for enqueueing records; owns the background flush worker.
pub struct CacheWriteBuffer {
    sender: mpsc::Sender<CacheRecord>,
    stop: CancellationToken,
    worker: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl CacheWriteBuffer {
    pub fn spawn(
        store: Arc<dyn StreamCacheStore>,
        config: WriteBufferConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let stop = shutdown.child_token();
        let (sender, receiver) = mpsc::channel(config.max_buffer_size * 2);
        let worker = tokio::spawn(flush_loop(store, config, receiver, stop.clone()));
        Self {
            sender,
            stop,
            worker: std::sync::Mutex::new(Some(worker)),
        }
    }

    /// Queue a record for background persistence. A full queue drops the
    /// record with a log line rather than blocking the request path.
    pub fn enqueue(&self, record: CacheRecord) {
        if let Err(err) = self.sender.try_send(record) {
            debug!(error = %err, "write buffer full, dropping record");
        }
    }

    /// Stop the worker and wait for its final flush.
    pub async fn close(&self) {
        self.stop.cancel();
        let worker = self.worker.lock().expect("worker mutex poisoned").take();
        if let Some(worker) = worker
            && let Err(err) = worker.await
        {
            error!(error = %err, "write buffer worker failed");
        }
    }
}

async fn flush_loop(
    store: Arc<dyn StreamCacheStore>,
    config: WriteBufferConfig,
    mut receiver: mpsc::Receiver<CacheRecord>,
    shutdown: CancellationToken,
) {
    let mut buffer: Vec<CacheRecord> = Vec::with_capacity(config.max_buffer_size);
    let mut ticker = tokio::time::interval(config.flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            item = receiver.recv() => {
                match item {
                    Some(record) => {
                        buffer.push(record);
                        if buffer.len() >= config.max_buffer_size {
                            flush(&store, &mut buffer).await;
                        }
                    }
                    None => {
                        flush(&store, &mut buffer).await;
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                flush(&store, &mut buffer).await;
            }
            _ = shutdown.cancelled() => {
                // Drain whatever is already queued, then stop.
                while let Ok(record) = receiver.try_recv() {
                    buffer.push(record);
                }
                flush(&store, &mut buffer).await;
                break;
            }
        }
    }
}

async fn flush(store: &Arc<dyn StreamCacheStore>, buffer: &mut Vec<CacheRecord>) {
    if buffer.is_empty() {
        return;
    }
    let batch = std::mem::take(buffer);
    if let Err(err) = store.upsert_many(&batch).await {
        error!(error = %err, count = batch.len(), "cache batch flush failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingStore {
        flushes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl StreamCacheStore for CollectingStore {
        async fn upsert(&self, _record: &CacheRecord) -> Result<()> {
            Ok(())
        }
        async fn upsert_many(&self, records: &[CacheRecord]) -> Result<()> {
            self.flushes.lock().unwrap().push(records.len());
            Ok(())
        }
        async fn known_cached(
            &self,
            _service: &str,
            _hashes: &HashSet<String>,
        ) -> Result<HashSet<String>> {
            Ok(HashSet::new())
        }
        async fn record(
            &self,
            _service: &str,
            _hash: &str,
        ) -> Result<Option<CacheRecord>> {
            Ok(None)
        }
        async fn release_counts(
            &self,
            _service: &str,
            _release_key: &str,
        ) -> Result<crate::database::store::ReleaseCounts> {
            Ok(Default::default())
        }
        async fn clear_search_results(&self) -> Result<u64> {
            Ok(0)
        }
        async fn clear_service(&self, _service: &str) -> Result<u64> {
            Ok(0)
        }
        async fn clear_all(&self) -> Result<u64> {
            Ok(0)
        }
        async fn sweep_expired(&self) -> Result<u64> {
            Ok(0)
        }
    }

    fn record(tag: &str) -> CacheRecord {
        CacheRecord::new("svc", tag.repeat(40), Utc::now() + chrono::Duration::days(1))
    }

    #[tokio::test]
    async fn flushes_when_buffer_fills() {
        let store = Arc::new(CollectingStore::default());
        let buffer = CacheWriteBuffer::spawn(
            store.clone(),
            WriteBufferConfig {
                max_buffer_size: 2,
                flush_interval: Duration::from_secs(60),
            },
            CancellationToken::new(),
        );

        buffer.enqueue(record("a"));
        buffer.enqueue(record("b"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.flushes.lock().unwrap().as_slice(), &[2]);
        buffer.close().await;
    }

    #[tokio::test]
    async fn close_flushes_the_remainder() {
        let store = Arc::new(CollectingStore::default());
        let buffer = CacheWriteBuffer::spawn(
            store.clone(),
            WriteBufferConfig {
                max_buffer_size: 10,
                flush_interval: Duration::from_secs(60),
            },
            CancellationToken::new(),
        );

        buffer.enqueue(record("a"));
        buffer.close().await;
        assert_eq!(store.flushes.lock().unwrap().as_slice(), &[1]);
    }
}
