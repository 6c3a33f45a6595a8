//! Driver over the user's own indexed media library.
//!
//! Personal files are always "cached": membership is a lookup against the
//! library index, and season packs resolve against the stored file listing
//! instead of a vendor API.

use crate::service::{
    DebridError, DebridService, DriverContext, LiveCacheCheck, SeasonPackInspect,
};
use async_trait::async_trait;
use release_types::PackHint;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// One file known to the library for a given torrent hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryFile {
    pub path: String,
    pub bytes: u64,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

/// Read-only view of the user's indexed library, keyed by info-hash.
#[async_trait]
pub trait HomeLibrary: Send + Sync {
    /// Subset of `hashes` present in the library.
    async fn known_hashes(&self, hashes: &HashSet<String>) -> HashSet<String>;

    /// File listing for one hash, empty when unknown.
    async fn files_for_hash(&self, hash: &str) -> Vec<LibraryFile>;
}

pub struct HomeMediaDriver {
    library: Arc<dyn HomeLibrary>,
}

impl HomeMediaDriver {
    pub fn new(library: Arc<dyn HomeLibrary>) -> Self {
        Self { library }
    }
}

#[async_trait]
impl DebridService for HomeMediaDriver {
    fn identifier(&self) -> &'static str {
        "homemedia"
    }

    async fn batch_check_hashes(
        &self,
        hashes: &HashSet<String>,
        ctx: &DriverContext,
    ) -> Result<HashSet<String>, DebridError> {
        if ctx.cancel.is_cancelled() {
            return Ok(HashSet::new());
        }
        let known = self.library.known_hashes(hashes).await;
        debug!(tag = %ctx.tag, asked = hashes.len(), known = known.len(), "home library batch check");
        Ok(known)
    }

    fn as_live_checker(&self) -> Option<&dyn LiveCacheCheck> {
        Some(self)
    }

    fn as_pack_inspector(&self) -> Option<&dyn SeasonPackInspect> {
        Some(self)
    }
}

#[async_trait]
impl LiveCacheCheck for HomeMediaDriver {
    async fn live_check_hash(
        &self,
        hash: &str,
        ctx: &DriverContext,
    ) -> Result<bool, DebridError> {
        if ctx.cancel.is_cancelled() {
            return Ok(false);
        }
        let mut single = HashSet::new();
        single.insert(hash.to_string());
        Ok(!self.library.known_hashes(&single).await.is_empty())
    }
}

#[async_trait]
impl SeasonPackInspect for HomeMediaDriver {
    async fn batch_inspect_season_packs(
        &self,
        hashes: &[String],
        season: u32,
        episode: u32,
        ctx: &DriverContext,
    ) -> Result<HashMap<String, Option<PackHint>>, DebridError> {
        let mut out = HashMap::new();
        for hash in hashes {
            if ctx.cancel.is_cancelled() {
                break;
            }
            let hit = self
                .library
                .files_for_hash(hash)
                .await
                .into_iter()
                .find(|f| f.season == Some(season) && f.episode == Some(episode))
                .map(|f| PackHint {
                    file_path: f.path,
                    file_bytes: f.bytes,
                    torrent_id: None,
                    file_id: None,
                });
            out.insert(hash.clone(), hit);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    struct FixedLibrary {
        files: HashMap<String, Vec<LibraryFile>>,
    }

    #[async_trait]
    impl HomeLibrary for FixedLibrary {
        async fn known_hashes(&self, hashes: &HashSet<String>) -> HashSet<String> {
            hashes
                .iter()
                .filter(|h| self.files.contains_key(*h))
                .cloned()
                .collect()
        }

        async fn files_for_hash(&self, hash: &str) -> Vec<LibraryFile> {
            self.files.get(hash).cloned().unwrap_or_default()
        }
    }

    fn driver() -> HomeMediaDriver {
        let mut files = HashMap::new();
        files.insert(
            "a".repeat(40),
            vec![
                LibraryFile {
                    path: "Show/S02/E04.mkv".into(),
                    bytes: 700,
                    season: Some(2),
                    episode: Some(4),
                },
                LibraryFile {
                    path: "Show/S02/E05.mkv".into(),
                    bytes: 800,
                    season: Some(2),
                    episode: Some(5),
                },
            ],
        );
        HomeMediaDriver::new(Arc::new(FixedLibrary { files }))
    }

    fn ctx() -> DriverContext {
        DriverContext::new(CancellationToken::new(), "test")
    }

    #[tokio::test]
    async fn batch_check_reports_known_hashes() {
        let driver = driver();
        let mut asked = HashSet::new();
        asked.insert("a".repeat(40));
        asked.insert("b".repeat(40));
        let known = driver.batch_check_hashes(&asked, &ctx()).await.unwrap();
        assert_eq!(known.len(), 1);
        assert!(known.contains(&"a".repeat(40)));
    }

    #[tokio::test]
    async fn pack_inspection_finds_target_episode() {
        let driver = driver();
        let hashes = vec!["a".repeat(40), "b".repeat(40)];
        let hints = driver
            .batch_inspect_season_packs(&hashes, 2, 5, &ctx())
            .await
            .unwrap();
        let hit = hints.get(&"a".repeat(40)).unwrap().as_ref().unwrap();
        assert_eq!(hit.file_path, "Show/S02/E05.mkv");
        assert!(hints.get(&"b".repeat(40)).unwrap().is_none());
    }
}
