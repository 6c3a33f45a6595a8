//! Bounded parallel search across the enabled scrapers.

use crate::config::FanoutPolicy;
use futures::future::join_all;
use indexers::{ScrapeContext, ScrapeError, ScrapeQuery, Scraper};
use release_types::ReleaseCandidate;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Run every enabled scraper (multiplied per selected language) under one
/// cancellation scope, flatten the results and deduplicate by info-hash,
/// keeping the first occurrence.
///
/// Individual scraper failures and panics degrade to empty lists; only the
/// `fatal_error_cancels_siblings` policy turns the first error into a
/// cancellation of the remaining invocations.
pub async fn run_fanout(
    scrapers: &[Arc<dyn Scraper>],
    languages: &[String],
    query: &ScrapeQuery,
    cancel: &CancellationToken,
    policy: &FanoutPolicy,
) -> Vec<ReleaseCandidate> {
    let scope = cancel.child_token();

    let mut invocations: Vec<(Arc<dyn Scraper>, Option<String>)> = Vec::new();
    for scraper in scrapers {
        if languages.is_empty() {
            invocations.push((scraper.clone(), None));
        } else {
            for language in languages {
                invocations.push((scraper.clone(), Some(language.clone())));
            }
        }
    }

    let handles: Vec<_> = invocations
        .into_iter()
        .map(|(scraper, language)| {
            let scope = scope.clone();
            let fatal = policy.fatal_error_cancels_siblings;
            let mut query = query.clone();
            query.language = language;
            tokio::spawn(async move {
                let tag = format!(
                    "{}/{}",
                    scraper.name(),
                    query.language.as_deref().unwrap_or("-")
                );
                let ctx = ScrapeContext::new(scope.clone(), tag.clone());
                let result = tokio::select! {
                    _ = scope.cancelled() => Err(ScrapeError::Cancelled),
                    result = scraper.search(&query, &ctx) => result,
                };
                match result {
                    Ok(candidates) => {
                        debug!(tag = %tag, count = candidates.len(), "scraper finished");
                        candidates
                    }
                    Err(err) => {
                        if matches!(err, ScrapeError::Cancelled) {
                            debug!(tag = %tag, "scraper cancelled");
                        } else {
                            warn!(tag = %tag, error = %err, "scraper failed, degrading to empty");
                            if fatal {
                                scope.cancel();
                            }
                        }
                        Vec::new()
                    }
                }
            })
        })
        .collect();

    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for joined in join_all(handles).await {
        let candidates = match joined {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(error = %err, "scraper task panicked, degrading to empty");
                Vec::new()
            }
        };
        for candidate in candidates {
            if seen.insert(candidate.info_hash.to_ascii_lowercase()) {
                merged.push(candidate);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use release_types::StreamKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedScraper {
        name: String,
        hashes: Vec<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Scraper for FixedScraper {
        fn name(&self) -> &str {
            &self.name
        }

        async fn search(
            &self,
            _query: &ScrapeQuery,
            _ctx: &ScrapeContext,
        ) -> Result<Vec<ReleaseCandidate>, ScrapeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .hashes
                .iter()
                .map(|h| ReleaseCandidate::new(h.repeat(40), format!("Title {h}")))
                .collect())
        }
    }

    struct FailingScraper;

    #[async_trait]
    impl Scraper for FailingScraper {
        fn name(&self) -> &str {
            "failing"
        }

        async fn search(
            &self,
            _query: &ScrapeQuery,
            _ctx: &ScrapeContext,
        ) -> Result<Vec<ReleaseCandidate>, ScrapeError> {
            Err(ScrapeError::Status {
                status: reqwest::StatusCode::BAD_GATEWAY,
            })
        }
    }

    struct SlowScraper {
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Scraper for SlowScraper {
        fn name(&self) -> &str {
            "slow"
        }

        async fn search(
            &self,
            _query: &ScrapeQuery,
            ctx: &ScrapeContext,
        ) -> Result<Vec<ReleaseCandidate>, ScrapeError> {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(ScrapeError::Cancelled),
                _ = tokio::time::sleep(Duration::from_secs(5)) => {}
            }
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(vec![ReleaseCandidate::new("f".repeat(40), "slow result")])
        }
    }

    fn query() -> ScrapeQuery {
        ScrapeQuery {
            kind: StreamKind::Movie,
            id: "tt0100".to_string(),
            text: "some movie 2020".to_string(),
            language: None,
        }
    }

    #[tokio::test]
    async fn deduplicates_by_hash_keeping_first() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scrapers: Vec<Arc<dyn Scraper>> = vec![
            Arc::new(FixedScraper {
                name: "one".into(),
                hashes: vec!["a", "b"],
                calls: calls.clone(),
            }),
            Arc::new(FixedScraper {
                name: "two".into(),
                hashes: vec!["b", "c"],
                calls: calls.clone(),
            }),
        ];

        let merged = run_fanout(
            &scrapers,
            &[],
            &query(),
            &CancellationToken::new(),
            &FanoutPolicy::default(),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let hashes: Vec<_> = merged.iter().map(|c| c.info_hash.as_str()).collect();
        assert_eq!(hashes, vec!["a".repeat(40), "b".repeat(40), "c".repeat(40)]);
        assert_eq!(merged[1].title, "Title b");
    }

    #[tokio::test]
    async fn languages_multiply_invocations() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scrapers: Vec<Arc<dyn Scraper>> = vec![Arc::new(FixedScraper {
            name: "one".into(),
            hashes: vec!["a"],
            calls: calls.clone(),
        })];

        run_fanout(
            &scrapers,
            &["en".to_string(), "fr".to_string()],
            &query(),
            &CancellationToken::new(),
            &FanoutPolicy::default(),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn scraper_failure_degrades_without_touching_siblings() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scrapers: Vec<Arc<dyn Scraper>> = vec![
            Arc::new(FailingScraper),
            Arc::new(FixedScraper {
                name: "two".into(),
                hashes: vec!["a"],
                calls: calls.clone(),
            }),
        ];

        let merged = run_fanout(
            &scrapers,
            &[],
            &query(),
            &CancellationToken::new(),
            &FanoutPolicy::default(),
        )
        .await;

        assert_eq!(merged.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fatal_policy_cancels_slow_siblings() {
        let finished = Arc::new(AtomicUsize::new(0));
        let scrapers: Vec<Arc<dyn Scraper>> = vec![
            Arc::new(FailingScraper),
            Arc::new(SlowScraper {
                finished: finished.clone(),
            }),
        ];

        let started = std::time::Instant::now();
        let merged = run_fanout(
            &scrapers,
            &[],
            &query(),
            &CancellationToken::new(),
            &FanoutPolicy {
                fatal_error_cancels_siblings: true,
            },
        )
        .await;

        assert!(merged.is_empty());
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
