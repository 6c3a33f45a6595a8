//! The aggregation facade.
//!
//! One entry point per `(service, type, id)` request: resolve metadata,
//! execute (or join) the coordinated search, filter candidates, run cache
//! admission, merge personal files and schedule background persistence.

use crate::config::AppConfig;
use crate::database::batching::CacheWriteBuffer;
use crate::database::models::{CacheRecord, RecordData};
use crate::database::store::{ReleaseCounts, StreamCacheStore};
use crate::metadata::{MetaInfo, MetadataProvider};
use crate::{Error, Result};
use debrid::DebridService;
use futures::FutureExt;
use indexers::{ScrapeQuery, Scraper};
use relname::MemoizedParser;
use release_types::{AdmittedStream, EpisodeTarget, ReleaseCandidate, StreamKind};
use sift_engine::{
    AdmissionEngine, AdmissionPolicy, CoordinationKey, EngineError, FanoutPolicy, QuotaPlan,
    SearchCoordinator, ShareKey, run_fanout,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub type SearchResult = Arc<Vec<AdmittedStream>>;

pub struct AggregatorService {
    config: Arc<AppConfig>,
    metadata: Arc<dyn MetadataProvider>,
    store: Arc<dyn StreamCacheStore>,
    coordinator: Arc<SearchCoordinator<SearchResult>>,
    scrapers: Vec<Arc<dyn Scraper>>,
    parser: Arc<MemoizedParser>,
    write_buffer: Arc<CacheWriteBuffer>,
}

impl AggregatorService {
    pub fn new(
        config: Arc<AppConfig>,
        metadata: Arc<dyn MetadataProvider>,
        store: Arc<dyn StreamCacheStore>,
        coordinator: Arc<SearchCoordinator<SearchResult>>,
        scrapers: Vec<Arc<dyn Scraper>>,
        parser: Arc<MemoizedParser>,
        write_buffer: Arc<CacheWriteBuffer>,
    ) -> Self {
        Self {
            config,
            metadata,
            store,
            coordinator,
            scrapers,
            parser,
            write_buffer,
        }
    }

    /// Produce the ranked list of playable stream candidates for one request.
    ///
    /// `personal` carries the caller's own media; it wins hash conflicts
    /// against external admissions.
    pub async fn search(
        &self,
        driver: Arc<dyn DebridService>,
        kind: StreamKind,
        id: &str,
        episode: Option<EpisodeTarget>,
        personal: Vec<AdmittedStream>,
        cancel: &CancellationToken,
    ) -> Result<Vec<AdmittedStream>> {
        let Some(meta) = self.metadata.get_meta(kind, id, cancel).await? else {
            debug!(id, "no metadata for id, returning empty");
            return Ok(Vec::new());
        };

        let scoped_id = match episode {
            Some(target) => format!("{id}:{}:{}", target.season, target.episode),
            None => id.to_string(),
        };
        let search_text = match episode {
            Some(target) => format!(
                "{} s{:02} e{:02}",
                meta.title, target.season, target.episode
            ),
            None => match meta.year {
                Some(year) => format!("{} {year}", meta.title),
                None => meta.title.clone(),
            },
        };
        let release_key = format!(
            "{kind}:{scoped_id}:{}",
            self.config.languages.join("+")
        );

        let counts = match self
            .store
            .release_counts(driver.identifier(), &release_key)
            .await
        {
            Ok(counts) => counts,
            Err(err) => {
                warn!(error = %err, "release counts unavailable, assuming empty");
                ReleaseCounts::default()
            }
        };
        let mut quotas = self.config.base_quota_plan();
        for (&(category, resolution), &count) in &counts.by_category_resolution {
            quotas.set_satisfied_by_db(category, resolution, count);
        }

        let key = CoordinationKey {
            service: driver.identifier().to_string(),
            kind,
            id: scoped_id.clone(),
            config_summary: self.config.summary(),
        };
        let share_key = ShareKey {
            kind,
            id: scoped_id.clone(),
            config_summary: self.config.summary(),
        };

        let job = SearchJob {
            coordinator: self.coordinator.clone(),
            scrapers: self.scrapers.clone(),
            languages: self.config.languages.clone(),
            fanout_policy: FanoutPolicy {
                fatal_error_cancels_siblings: self.config.fatal_scraper_errors,
            },
            parser: self.parser.clone(),
            policy: self.config.admission_policy(),
            quotas,
            meta,
            kind,
            episode,
            search_text,
            share_key,
            scoped_id,
            driver: driver.clone(),
            write_buffer: self.write_buffer.clone(),
            cache_ttl: self.config.cache_ttl,
            release_key,
        };

        let outcome = self
            .coordinator
            .execute_search(key, move |search_cancel| {
                // Spawned so that a coordinator deadline dropping this future
                // cannot skip the driver's cleanup; the task always runs to
                // completion and exits quickly once the signal fires.
                async move {
                    let handle = tokio::spawn(job.run(search_cancel));
                    match handle.await {
                        Ok(result) => result,
                        Err(err) => {
                            Err(EngineError::internal(format!("search task failed: {err}")))
                        }
                    }
                }
                .boxed()
            })
            .await;

        let admitted = match outcome {
            Ok(admitted) => admitted,
            Err(err) if err.is_terminal_for_service() => return Err(Error::Search(err)),
            Err(err) => match &*err {
                EngineError::Internal { .. } => return Err(Error::Search(err)),
                _ => {
                    warn!(error = %err, "search degraded to empty result");
                    Arc::new(Vec::new())
                }
            },
        };

        let mut merged = personal;
        let mut seen: HashSet<String> = merged
            .iter()
            .map(|s| s.info_hash.to_ascii_lowercase())
            .collect();
        for stream in admitted.iter() {
            if seen.insert(stream.info_hash.clone()) {
                merged.push(stream.clone());
            }
        }
        Ok(merged)
    }
}

/// Everything one coordinated search needs, owned so the future is `'static`.
struct SearchJob {
    coordinator: Arc<SearchCoordinator<SearchResult>>,
    scrapers: Vec<Arc<dyn Scraper>>,
    languages: Vec<String>,
    fanout_policy: FanoutPolicy,
    parser: Arc<MemoizedParser>,
    policy: AdmissionPolicy,
    quotas: QuotaPlan,
    meta: MetaInfo,
    kind: StreamKind,
    episode: Option<EpisodeTarget>,
    search_text: String,
    share_key: ShareKey,
    scoped_id: String,
    driver: Arc<dyn DebridService>,
    write_buffer: Arc<CacheWriteBuffer>,
    cache_ttl: Duration,
    release_key: String,
}

impl SearchJob {
    async fn run(self, cancel: CancellationToken) -> std::result::Result<SearchResult, EngineError> {
        let candidates = match self.coordinator.shared_scrape(&self.share_key) {
            Some(shared) => {
                debug!(id = %self.scoped_id, "reusing shared scraper results");
                (*shared).clone()
            }
            None => {
                let query = ScrapeQuery {
                    kind: self.kind,
                    id: self.scoped_id.clone(),
                    text: self.search_text.to_lowercase(),
                    language: None,
                };
                let results = run_fanout(
                    &self.scrapers,
                    &self.languages,
                    &query,
                    &cancel,
                    &self.fanout_policy,
                )
                .await;
                self.coordinator
                    .store_scrape(self.share_key.clone(), Arc::new(results.clone()));
                results
            }
        };

        let filtered: Vec<ReleaseCandidate> = candidates
            .into_iter()
            .filter(|candidate| {
                let parsed = self.parser.parse(&candidate.title);
                match self.kind {
                    StreamKind::Series => {
                        relname::matches_series_title(&parsed, &candidate.title, &self.meta.title)
                    }
                    StreamKind::Movie => relname::matches_movie_title(
                        &parsed,
                        &candidate.title,
                        &self.meta.title,
                        self.meta.year,
                    ),
                }
            })
            .collect();
        debug!(
            id = %self.scoped_id,
            candidates = filtered.len(),
            "candidates after title filtering"
        );

        let engine = AdmissionEngine::new(self.policy.clone(), self.parser.clone());
        let admitted = engine
            .run(
                self.driver.as_ref(),
                filtered,
                &self.quotas,
                self.episode,
                &cancel,
            )
            .await?;

        let expires_at = chrono::Utc::now()
            + chrono::Duration::from_std(self.cache_ttl)
                .unwrap_or_else(|_| chrono::Duration::days(30));
        for stream in &admitted {
            let mut record = CacheRecord::new(&stream.source, &stream.info_hash, expires_at);
            record.file_name = Some(stream.title.clone());
            record.size = Some(stream.size as i64);
            record.category = Some(stream.category);
            record.resolution = Some(stream.resolution);
            record.release_key = Some(self.release_key.clone());
            record.data = serde_json::to_value(RecordData {
                episode_file_hint: stream.episode_file_hint.clone(),
                tracker: Some(stream.tracker.clone()),
                files: None,
            })
            .ok();
            self.write_buffer.enqueue(record);
        }

        Ok(Arc::new(admitted))
    }
}
