//! Bridges the persistent cache to the home-media driver.
//!
//! Personal media rows live in the same store as admission records, under the
//! `homemedia` service, with their file listings in the record payload.

use crate::database::models::RecordData;
use crate::database::store::StreamCacheStore;
use async_trait::async_trait;
use debrid::{HomeLibrary, LibraryFile};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

const SERVICE: &str = "homemedia";

pub struct StoreHomeLibrary {
    store: Arc<dyn StreamCacheStore>,
}

impl StoreHomeLibrary {
    pub fn new(store: Arc<dyn StreamCacheStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl HomeLibrary for StoreHomeLibrary {
    async fn known_hashes(&self, hashes: &HashSet<String>) -> HashSet<String> {
        match self.store.known_cached(SERVICE, hashes).await {
            Ok(known) => known,
            Err(err) => {
                warn!(error = %err, "home library lookup failed");
                HashSet::new()
            }
        }
    }

    async fn files_for_hash(&self, hash: &str) -> Vec<LibraryFile> {
        let record = match self.store.record(SERVICE, hash).await {
            Ok(Some(record)) => record,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(error = %err, "home library file lookup failed");
                return Vec::new();
            }
        };

        let Some(data) = record.data else {
            return Vec::new();
        };
        let Ok(data) = serde_json::from_value::<RecordData>(data) else {
            return Vec::new();
        };

        data.files
            .unwrap_or_default()
            .into_iter()
            .map(|f| LibraryFile {
                path: f.path,
                bytes: f.bytes,
                season: f.season,
                episode: f.episode,
            })
            .collect()
    }
}
