//! End-to-end admission engine scenarios against a scripted driver.

use async_trait::async_trait;
use debrid::{DebridError, DebridService, DriverContext, LiveCacheCheck, SeasonPackInspect};
use relname::MemoizedParser;
use release_types::{
    AdmissionSource, Category, Codec, EpisodeTarget, PackHint, ReleaseCandidate, Resolution,
};
use sift_engine::{AdmissionEngine, AdmissionPolicy, QuotaPlan};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

fn hash(tag: char) -> String {
    tag.to_string().repeat(40)
}

fn candidate(tag: char, title: &str, size: u64) -> ReleaseCandidate {
    let mut candidate = ReleaseCandidate::new(hash(tag), title);
    candidate.size = size;
    candidate.tracker = "test-tracker".to_string();
    candidate
}

#[derive(Default)]
struct ScriptedDriver {
    cached: HashSet<String>,
    /// Hashes confirmable through the live check; `None` disables the
    /// capability entirely.
    live: Option<HashSet<String>>,
    /// Confirmed pack hints; `None` disables the inspect capability.
    pack_hints: Option<HashMap<String, PackHint>>,
    batch_fails: bool,
    auth_fails: bool,
    batch_calls: AtomicUsize,
    live_calls: AtomicUsize,
    inspect_calls: AtomicUsize,
    cleanup_calls: AtomicUsize,
}

impl ScriptedDriver {
    fn cached(tags: &[char]) -> Self {
        Self {
            cached: tags.iter().map(|&t| hash(t)).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl DebridService for ScriptedDriver {
    fn identifier(&self) -> &'static str {
        "scripted"
    }

    async fn batch_check_hashes(
        &self,
        hashes: &HashSet<String>,
        _ctx: &DriverContext,
    ) -> Result<HashSet<String>, DebridError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.auth_fails {
            return Err(DebridError::Auth {
                service: "scripted",
            });
        }
        if self.batch_fails {
            return Err(DebridError::driver("scripted", "500 from vendor"));
        }
        Ok(hashes.intersection(&self.cached).cloned().collect())
    }

    fn as_live_checker(&self) -> Option<&dyn LiveCacheCheck> {
        self.live.as_ref().map(|_| self as &dyn LiveCacheCheck)
    }

    fn as_pack_inspector(&self) -> Option<&dyn SeasonPackInspect> {
        self.pack_hints
            .as_ref()
            .map(|_| self as &dyn SeasonPackInspect)
    }

    async fn cleanup(&self) {
        self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LiveCacheCheck for ScriptedDriver {
    async fn live_check_hash(
        &self,
        hash: &str,
        _ctx: &DriverContext,
    ) -> Result<bool, DebridError> {
        self.live_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .live
            .as_ref()
            .is_some_and(|set| set.contains(hash)))
    }
}

#[async_trait]
impl SeasonPackInspect for ScriptedDriver {
    async fn batch_inspect_season_packs(
        &self,
        hashes: &[String],
        _season: u32,
        _episode: u32,
        _ctx: &DriverContext,
    ) -> Result<HashMap<String, Option<PackHint>>, DebridError> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        let hints = self.pack_hints.as_ref().expect("inspect without capability");
        Ok(hashes
            .iter()
            .map(|h| (h.clone(), hints.get(h).cloned()))
            .collect())
    }
}

fn engine() -> AdmissionEngine {
    AdmissionEngine::new(AdmissionPolicy::default(), Arc::new(MemoizedParser::default()))
}

fn engine_with(policy: AdmissionPolicy) -> AdmissionEngine {
    AdmissionEngine::new(policy, Arc::new(MemoizedParser::default()))
}

#[tokio::test]
async fn golden_only_episode_admits_in_tier_order() {
    // E1: premium candidates fill the golden tier, the 720p rip never runs.
    let driver = ScriptedDriver::cached(&['a', 'b', 'c', 'd']);
    let candidates = vec![
        candidate('a', "Show.S01E03.2160p.BluRay.REMUX", 60 * 1024 * 1024 * 1024),
        candidate('b', "Show.S01E03.1080p.BluRay.REMUX", 20 * 1024 * 1024 * 1024),
        candidate('c', "Show.S01E03.1080p.WEB-DL.H264", 8 * 1024 * 1024 * 1024),
        candidate('d', "Show.S01E03.720p.WEBRip.x264", 700 * 1024 * 1024),
    ];

    let admitted = engine()
        .run(
            &driver,
            candidates,
            &QuotaPlan::default(),
            Some(EpisodeTarget::new(1, 3)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let hashes: Vec<_> = admitted.iter().map(|s| s.info_hash.clone()).collect();
    assert_eq!(hashes, vec![hash('a'), hash('b'), hash('c')]);
    assert!(admitted.iter().all(|s| s.from == AdmissionSource::ApiBatch));
    assert!(admitted.iter().all(|s| s.is_cached));
    assert_eq!(driver.cleanup_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pack_inspection_confirms_episode_and_attaches_hint() {
    // E2: the confirmed pack is admitted with its file hint, the unconfirmed
    // one is omitted.
    let mut driver = ScriptedDriver::cached(&['x']);
    let mut hints = HashMap::new();
    hints.insert(
        hash('p'),
        PackHint {
            file_path: "E05.mkv".to_string(),
            file_bytes: 900_000_000,
            torrent_id: Some("t-1".to_string()),
            file_id: None,
        },
    );
    driver.pack_hints = Some(hints);

    let candidates = vec![
        candidate('p', "Show.S02.2160p.BluRay.REMUX", 80_000_000_000),
        candidate('q', "Show.S02.1080p.WEB-DL", 30_000_000_000),
        candidate('x', "Show.S02E05.WEB-DL", 4_000_000_000),
    ];

    let admitted = engine()
        .run(
            &driver,
            candidates,
            &QuotaPlan::default(),
            Some(EpisodeTarget::new(2, 5)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(admitted.len(), 2);
    let x = admitted.iter().find(|s| s.info_hash == hash('x')).unwrap();
    assert_eq!(x.from, AdmissionSource::ApiBatch);

    let p = admitted.iter().find(|s| s.info_hash == hash('p')).unwrap();
    assert_eq!(p.from, AdmissionSource::BatchPackInspection);
    assert_eq!(
        p.episode_file_hint.as_ref().unwrap().file_path,
        "E05.mkv"
    );

    assert!(admitted.iter().all(|s| s.info_hash != hash('q')));
    assert_eq!(driver.inspect_calls.load(Ordering::SeqCst), 1);
    assert_eq!(driver.cleanup_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn db_satisfied_buckets_admit_nothing() {
    // E3: personal files already cover Remux/1080p.
    let driver = ScriptedDriver::cached(&['a']);
    let plan = QuotaPlan::builder()
        .satisfied_by_db(Category::Remux, Resolution::R1080p, 2)
        .build();

    let admitted = engine()
        .run(
            &driver,
            vec![candidate('a', "Movie.2020.1080p.BluRay.REMUX", 30_000_000_000)],
            &plan,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(admitted.is_empty());
    assert_eq!(driver.cleanup_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fully_saturated_quotas_skip_the_driver() {
    let driver = ScriptedDriver::cached(&['a']);
    let mut builder = QuotaPlan::builder();
    for category in [
        Category::Remux,
        Category::BluRay,
        Category::Web,
        Category::WebRip,
        Category::AudioFocused,
        Category::Other,
    ] {
        builder = builder.category_limit(category, 0);
    }

    let admitted = engine()
        .run(
            &driver,
            vec![candidate('a', "Movie.2020.1080p.BluRay.REMUX", 1)],
            &builder.build(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(admitted.is_empty());
    assert_eq!(driver.batch_calls.load(Ordering::SeqCst), 0);
    assert_eq!(driver.cleanup_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn codec_diversification_caps_per_codec() {
    // E4: one h265 slot, one h264 slot at 1080p.
    let driver = ScriptedDriver::cached(&['a', 'b', 'c']);
    let plan = QuotaPlan::builder()
        .codec_limit(Codec::H265, 1)
        .codec_limit(Codec::H264, 1)
        .build();
    let policy = AdmissionPolicy {
        diversify_codecs: true,
        ..AdmissionPolicy::default()
    };

    let admitted = engine_with(policy)
        .run(
            &driver,
            vec![
                candidate('a', "Movie.2020.1080p.REMUX.HEVC", 40_000_000_000),
                candidate('b', "Movie.2020.1080p.REMUX.x265", 35_000_000_000),
                candidate('c', "Movie.2020.1080p.REMUX.x264", 30_000_000_000),
            ],
            &plan,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let hashes: Vec<_> = admitted.iter().map(|s| s.info_hash.clone()).collect();
    assert_eq!(hashes, vec![hash('a'), hash('c')]);
}

#[tokio::test]
async fn admitted_hashes_are_unique() {
    let driver = ScriptedDriver::cached(&['a']);
    let admitted = engine()
        .run(
            &driver,
            vec![
                candidate('a', "Movie.2020.1080p.BluRay.REMUX", 10),
                candidate('a', "Movie.2020.1080p.BluRay.REMUX", 10),
            ],
            &QuotaPlan::default(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(admitted.len(), 1);
}

#[tokio::test]
async fn admission_order_is_deterministic() {
    let fixture = || {
        vec![
            candidate('a', "Show.S01E03.2160p.BluRay.REMUX", 60_000),
            candidate('b', "Show.S01E03.1080p.BluRay.REMUX", 20_000),
            candidate('c', "Show.S01E03.1080p.WEB-DL.H264", 8_000),
            candidate('d', "Show.S01E03.720p.WEBRip.x264", 700),
        ]
    };

    let mut sequences = Vec::new();
    for _ in 0..3 {
        let driver = ScriptedDriver::cached(&['a', 'b', 'c', 'd']);
        let admitted = engine()
            .run(
                &driver,
                fixture(),
                &QuotaPlan::default(),
                Some(EpisodeTarget::new(1, 3)),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        sequences.push(
            admitted
                .iter()
                .map(|s| s.info_hash.clone())
                .collect::<Vec<_>>(),
        );
    }
    assert_eq!(sequences[0], sequences[1]);
    assert_eq!(sequences[1], sequences[2]);
}

#[tokio::test]
async fn live_check_confirms_batch_misses_within_budget() {
    let mut driver = ScriptedDriver::default();
    driver.live = Some([hash('a'), hash('b'), hash('c')].into_iter().collect());
    let policy = AdmissionPolicy {
        max_live_checks: 1,
        ..AdmissionPolicy::default()
    };

    let admitted = engine_with(policy)
        .run(
            &driver,
            vec![
                candidate('a', "Movie.2020.1080p.BluRay.REMUX", 30),
                candidate('b', "Movie.2020.1080p.BluRay.REMUX.PROPER", 20),
                candidate('c', "Movie.2020.1080p.WEB-DL", 10),
            ],
            &QuotaPlan::default(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(admitted.len(), 1);
    assert_eq!(admitted[0].from, AdmissionSource::ApiLive);
    assert_eq!(driver.live_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn batch_contract_violation_degrades_to_live_checks() {
    let mut driver = ScriptedDriver::default();
    driver.batch_fails = true;
    driver.live = Some([hash('a')].into_iter().collect());

    let admitted = engine()
        .run(
            &driver,
            vec![candidate('a', "Movie.2020.1080p.BluRay.REMUX", 30)],
            &QuotaPlan::default(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(admitted.len(), 1);
    assert_eq!(admitted[0].from, AdmissionSource::ApiLive);
    assert_eq!(driver.cleanup_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn auth_failure_is_terminal_and_still_cleans_up() {
    let mut driver = ScriptedDriver::cached(&['a']);
    driver.auth_fails = true;

    let result = engine()
        .run(
            &driver,
            vec![candidate('a', "Movie.2020.1080p.BluRay.REMUX", 30)],
            &QuotaPlan::default(),
            None,
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(
        result,
        Err(sift_engine::EngineError::DriverAuth { .. })
    ));
    assert_eq!(driver.cleanup_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancellation_returns_partial_results_and_cleans_up() {
    // E6 at the engine boundary: a pre-fired signal yields an empty
    // best-effort result and exactly one cleanup call.
    let driver = ScriptedDriver::cached(&['a']);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let admitted = engine()
        .run(
            &driver,
            vec![candidate('a', "Movie.2020.1080p.BluRay.REMUX", 30)],
            &QuotaPlan::default(),
            None,
            &cancel,
        )
        .await
        .unwrap();

    assert!(admitted.is_empty());
    assert_eq!(driver.cleanup_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn global_resolution_cap_bounds_each_resolution() {
    let driver = ScriptedDriver::cached(&['a', 'b', 'c']);
    let plan = QuotaPlan::builder().global_resolution_cap(1).build();

    let admitted = engine()
        .run(
            &driver,
            vec![
                candidate('a', "Movie.2020.1080p.BluRay.REMUX", 30),
                candidate('b', "Movie.2020.1080p.WEB-DL", 20),
                candidate('c', "Movie.2020.2160p.WEB-DL", 25),
            ],
            &plan,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let at_1080 = admitted
        .iter()
        .filter(|s| s.resolution == Resolution::R1080p)
        .count();
    let at_2160 = admitted
        .iter()
        .filter(|s| s.resolution == Resolution::R2160p)
        .count();
    assert_eq!(at_1080, 1);
    assert_eq!(at_2160, 1);
}

#[tokio::test]
async fn early_exit_stops_once_premium_buckets_saturate() {
    // Remux saturated at both premium resolutions, BluRay never populated:
    // the lone Other-category candidate must not be reached.
    let driver = ScriptedDriver::cached(&['a', 'b', 'c', 'd', 'e']);
    let admitted = engine()
        .run(
            &driver,
            vec![
                candidate('a', "Movie.2020.2160p.REMUX-GRP1", 50),
                candidate('b', "Movie.2020.2160p.REMUX-GRP2", 45),
                candidate('c', "Movie.2020.1080p.REMUX-GRP1", 20),
                candidate('d', "Movie.2020.1080p.REMUX-GRP2", 18),
                candidate('e', "Movie.2020.2160p.HDTV", 9),
            ],
            &QuotaPlan::default(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let hashes: Vec<_> = admitted.iter().map(|s| s.info_hash.clone()).collect();
    assert_eq!(hashes, vec![hash('a'), hash('b'), hash('c'), hash('d')]);
}

#[tokio::test]
async fn webrip_hard_skip_drops_rip_candidates() {
    let driver = ScriptedDriver::cached(&['a', 'b']);
    let policy = AdmissionPolicy {
        skip_webrip: true,
        ..AdmissionPolicy::default()
    };

    let admitted = engine_with(policy)
        .run(
            &driver,
            vec![
                candidate('a', "Movie.2020.1080p.WEBRip.x264", 10),
                candidate('b', "Movie.2020.1080p.WEB-DL.H264", 8),
            ],
            &QuotaPlan::default(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(admitted.len(), 1);
    assert_eq!(admitted[0].info_hash, hash('b'));
}

#[tokio::test]
async fn quota_counts_never_exceed_limits() {
    // Property 1 exercised in bulk: ten cached WEB-DL releases, quota two.
    let tags: Vec<char> = ('a'..='j').collect();
    let driver = ScriptedDriver {
        cached: tags.iter().map(|&t| hash(t)).collect(),
        ..ScriptedDriver::default()
    };
    let candidates: Vec<_> = tags
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            candidate(
                t,
                &format!("Movie.2020.1080p.WEB-DL.GROUP{i}"),
                1_000 - i as u64,
            )
        })
        .collect();

    let admitted = engine()
        .run(
            &driver,
            candidates,
            &QuotaPlan::default(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let web_1080 = admitted
        .iter()
        .filter(|s| s.category == Category::Web && s.resolution == Resolution::R1080p)
        .count();
    assert_eq!(web_1080, 2);
    assert_eq!(admitted.len(), 2);
}
