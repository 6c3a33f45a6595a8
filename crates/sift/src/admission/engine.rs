//! The admission walk.

use crate::admission::classify::{self, Classified};
use crate::admission::packs;
use crate::admission::tiers::{HIGH_TIERS, LOW_TIERS, Tier};
use crate::admission::trackers::AdmissionTrackers;
use crate::config::{AdmissionPolicy, QuotaPlan};
use crate::error::EngineError;
use debrid::{DebridService, DriverContext};
use relname::MemoizedParser;
use release_types::{
    AdmissionSource, AdmittedStream, Category, Codec, EpisodeTarget, PackHint, ReleaseCandidate,
    Resolution,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const EARLY_EXIT_CATEGORIES: [Category; 2] = [Category::Remux, Category::BluRay];
const EARLY_EXIT_RESOLUTIONS: [Resolution; 2] = [Resolution::R2160p, Resolution::R1080p];

pub struct AdmissionEngine {
    policy: AdmissionPolicy,
    parser: Arc<MemoizedParser>,
}

enum TierFlow {
    Done,
    EarlyExit,
    Cancelled,
}

struct WalkState<'a> {
    quotas: &'a QuotaPlan,
    policy: &'a AdmissionPolicy,
    episode: Option<EpisodeTarget>,
    pre_cached: HashSet<String>,
    trackers: AdmissionTrackers,
    /// Separate pack counters, consulted only with `split_pack_quotas`.
    pack_category_resolution: HashMap<(Category, Resolution), u32>,
    admitted: Vec<AdmittedStream>,
    admitted_hashes: HashSet<String>,
    live_budget: u32,
    /// Buckets that held at least one candidate at grouping time; the
    /// early-exit rule treats never-populated buckets as unfillable.
    populated: HashSet<(Category, Resolution)>,
}

impl<'a> WalkState<'a> {
    fn quota_reached(&self, category: Category, resolution: Resolution, is_pack: bool) -> bool {
        let used = if is_pack && self.policy.split_pack_quotas {
            self.pack_category_resolution
                .get(&(category, resolution))
                .copied()
                .unwrap_or(0)
        } else {
            self.trackers.category_resolution(category, resolution)
        };
        used >= self.quotas.remaining_need(category, resolution)
    }

    fn codec_capped(&self, resolution: Resolution, codec: Codec) -> bool {
        self.policy.diversify_codecs
            && codec != Codec::Unknown
            && self.trackers.codec(resolution, codec) >= self.quotas.per_codec_max(codec)
    }

    fn resolution_capped(&self, resolution: Resolution) -> bool {
        let cap = self.quotas.global_resolution_cap();
        cap > 0 && self.trackers.resolution(resolution) >= cap
    }

    /// Global short-circuit: Remux and BluRay saturated at both premium
    /// resolutions. A bucket counts as saturated when its quota is met, or
    /// when it never held a candidate and so can never fill. At least one
    /// bucket must be genuinely count-met; with nothing admitted anywhere the
    /// exit would be vacuous.
    fn early_exit_applies(&self) -> bool {
        let mut any_count_met = false;
        for category in EARLY_EXIT_CATEGORIES {
            for resolution in EARLY_EXIT_RESOLUTIONS {
                let total = self.trackers.category_resolution(category, resolution)
                    + self.quotas.satisfied_by_db(category, resolution);
                if total >= self.quotas.per_category(category) {
                    any_count_met = true;
                } else if self.populated.contains(&(category, resolution)) {
                    return false;
                }
            }
        }
        any_count_met
    }

    fn admit(
        &mut self,
        entry: &Classified,
        from: AdmissionSource,
        source: &str,
        hint: Option<PackHint>,
    ) {
        let is_pack = matches!(from, AdmissionSource::BatchPackInspection);
        if is_pack && self.policy.split_pack_quotas {
            *self
                .pack_category_resolution
                .entry((entry.category, entry.resolution))
                .or_insert(0) += 1;
        }
        self.trackers
            .record(entry.category, entry.resolution, entry.codec);
        self.admitted_hashes.insert(entry.hash().to_string());
        self.admitted.push(AdmittedStream {
            info_hash: entry.hash().to_string(),
            title: entry.candidate.title.clone(),
            size: entry.size(),
            source: source.to_string(),
            tracker: entry.candidate.tracker.clone(),
            languages: entry.candidate.languages.clone(),
            is_cached: true,
            from,
            episode_file_hint: hint,
            category: entry.category,
            resolution: entry.resolution,
            codec: entry.codec,
        });
    }
}

impl AdmissionEngine {
    pub fn new(policy: AdmissionPolicy, parser: Arc<MemoizedParser>) -> Self {
        Self { policy, parser }
    }

    /// Run the admission walk against one driver.
    ///
    /// `driver.cleanup()` is invoked exactly once on every exit path,
    /// including cancellation and terminal driver errors. Cancellation
    /// returns the candidates admitted so far.
    pub async fn run(
        &self,
        driver: &dyn DebridService,
        candidates: Vec<ReleaseCandidate>,
        quotas: &QuotaPlan,
        episode: Option<EpisodeTarget>,
        cancel: &CancellationToken,
    ) -> Result<Vec<AdmittedStream>, EngineError> {
        let ctx = DriverContext::new(cancel.clone(), format!("admit/{}", driver.identifier()));
        let result = self
            .run_inner(driver, &ctx, candidates, quotas, episode, cancel)
            .await;
        driver.cleanup().await;
        result
    }

    async fn run_inner(
        &self,
        driver: &dyn DebridService,
        ctx: &DriverContext,
        candidates: Vec<ReleaseCandidate>,
        quotas: &QuotaPlan,
        episode: Option<EpisodeTarget>,
        cancel: &CancellationToken,
    ) -> Result<Vec<AdmittedStream>, EngineError> {
        let classified = classify::normalize_and_classify(candidates, &self.parser, &self.policy);
        if classified.is_empty() {
            return Ok(Vec::new());
        }

        // Everything the quotas allow is already covered by personal files:
        // skip the driver entirely.
        if quotas.fully_satisfied() {
            debug!(tag = %ctx.tag, "quotas fully satisfied by library, skipping driver");
            return Ok(Vec::new());
        }

        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }

        let all_hashes: HashSet<String> =
            classified.iter().map(|c| c.hash().to_string()).collect();
        let pre_cached = match driver.batch_check_hashes(&all_hashes, ctx).await {
            Ok(set) => set,
            Err(err) if err.is_terminal_for_service() => return Err(err.into()),
            Err(err) => {
                warn!(tag = %ctx.tag, error = %err, "batch check failed, falling back to live checks");
                HashSet::new()
            }
        };
        debug!(
            tag = %ctx.tag,
            candidates = classified.len(),
            pre_cached = pre_cached.len(),
            "batch cache pre-check done"
        );

        let mut groups: HashMap<(Category, Resolution), Vec<Classified>> = HashMap::new();
        for entry in &classified {
            groups
                .entry((entry.category, entry.resolution))
                .or_default()
                .push(entry.clone());
        }
        for bucket in groups.values_mut() {
            bucket.sort_by(|a, b| b.size().cmp(&a.size()));
        }

        let mut state = WalkState {
            quotas,
            policy: &self.policy,
            episode,
            pre_cached,
            trackers: AdmissionTrackers::default(),
            pack_category_resolution: HashMap::new(),
            admitted: Vec::new(),
            admitted_hashes: HashSet::new(),
            live_budget: self.policy.max_live_checks,
            populated: groups.keys().copied().collect(),
        };

        for tier in HIGH_TIERS {
            if cancel.is_cancelled() {
                return Ok(state.admitted);
            }
            if Self::tier_satisfied(tier, &state) {
                debug!(tag = %ctx.tag, tier = tier.name, "tier already satisfied, skipping");
                continue;
            }
            match self.walk_tier(driver, ctx, tier, &groups, &mut state).await? {
                TierFlow::Done => {}
                TierFlow::EarlyExit => {
                    debug!(tag = %ctx.tag, tier = tier.name, "early exit");
                    return Ok(state.admitted);
                }
                TierFlow::Cancelled => return Ok(state.admitted),
            }
        }

        if let (Some(target), Some(inspector)) = (episode, driver.as_pack_inspector())
            && !cancel.is_cancelled()
        {
            let pack_list = packs::collect_packs(&classified, target);
            if !pack_list.is_empty() {
                let hints =
                    packs::run_inspection_rounds(inspector, &pack_list, target, &self.policy, ctx)
                        .await
                        .map_err(EngineError::from)?;
                for pack in &pack_list {
                    let Some(hint) = hints.get(pack.hash()) else {
                        continue;
                    };
                    if state.admitted_hashes.contains(pack.hash()) {
                        continue;
                    }
                    if state.codec_capped(pack.resolution, pack.codec) {
                        continue;
                    }
                    if state.quota_reached(pack.category, pack.resolution, true) {
                        continue;
                    }
                    if state.resolution_capped(pack.resolution) {
                        continue;
                    }
                    state.admit(
                        pack,
                        AdmissionSource::BatchPackInspection,
                        driver.identifier(),
                        Some(hint.clone()),
                    );
                }
            }
        }

        if self.high_quality_satisfied(&state, &groups) {
            debug!(tag = %ctx.tag, "high-quality quotas satisfied, skipping low-res tiers");
            return Ok(state.admitted);
        }

        for tier in LOW_TIERS {
            if cancel.is_cancelled() {
                return Ok(state.admitted);
            }
            if Self::tier_satisfied(tier, &state) {
                continue;
            }
            match self.walk_tier(driver, ctx, tier, &groups, &mut state).await? {
                TierFlow::Done => {}
                TierFlow::EarlyExit => return Ok(state.admitted),
                TierFlow::Cancelled => return Ok(state.admitted),
            }
        }

        Ok(state.admitted)
    }

    /// Step-5 gate: every bucket the tier could fill is already at its
    /// external-admission limit.
    fn tier_satisfied(tier: &Tier, state: &WalkState<'_>) -> bool {
        tier.categories.iter().all(|&category| {
            tier.resolutions.iter().all(|&resolution| {
                state.trackers.category_resolution(category, resolution)
                    >= state.quotas.remaining_need(category, resolution)
            })
        })
    }

    /// Step-7 gate before the low-resolution tiers: each premium category is
    /// either at its limit (counting personal files at premium resolutions)
    /// or has nothing left in the low buckets that could improve it.
    fn high_quality_satisfied(
        &self,
        state: &WalkState<'_>,
        groups: &HashMap<(Category, Resolution), Vec<Classified>>,
    ) -> bool {
        [Category::Remux, Category::BluRay, Category::Web]
            .iter()
            .all(|&category| {
                let db_premium = state.quotas.satisfied_by_db(category, Resolution::R2160p)
                    + state.quotas.satisfied_by_db(category, Resolution::R1080p);
                if state.trackers.category_total(category) + db_premium
                    >= state.quotas.per_category(category)
                {
                    return true;
                }
                let has_low_candidates = groups
                    .get(&(category, Resolution::R720p))
                    .is_some_and(|bucket| {
                        bucket
                            .iter()
                            .any(|entry| !state.admitted_hashes.contains(entry.hash()))
                    });
                !has_low_candidates
            })
    }

    async fn walk_tier(
        &self,
        driver: &dyn DebridService,
        ctx: &DriverContext,
        tier: &Tier,
        groups: &HashMap<(Category, Resolution), Vec<Classified>>,
        state: &mut WalkState<'_>,
    ) -> Result<TierFlow, EngineError> {
        for &category in tier.categories {
            for &resolution in tier.resolutions {
                let Some(bucket) = groups.get(&(category, resolution)) else {
                    continue;
                };
                for entry in bucket {
                    if ctx.cancel.is_cancelled() {
                        return Ok(TierFlow::Cancelled);
                    }
                    let name = entry.name();

                    if let Some(target) = state.episode {
                        if relname::matches_other_episode(name, target.season, target.episode) {
                            continue;
                        }
                        if !relname::has_episode_marker(name, target.season, target.episode) {
                            // Season packs are not admitted here; they go
                            // through batched inspection instead.
                            continue;
                        }
                    }

                    if state.policy.skip_webrip && category == Category::WebRip {
                        continue;
                    }
                    if state.policy.skip_aac_opus && classify::has_audio_focus_token(name) {
                        continue;
                    }
                    if state.codec_capped(resolution, entry.codec) {
                        continue;
                    }
                    if state.quota_reached(category, resolution, false) {
                        continue;
                    }
                    if state.resolution_capped(resolution) {
                        continue;
                    }
                    if state.early_exit_applies() {
                        return Ok(TierFlow::EarlyExit);
                    }
                    if state.admitted_hashes.contains(entry.hash()) {
                        continue;
                    }

                    if state.pre_cached.contains(entry.hash()) {
                        state.admit(entry, AdmissionSource::ApiBatch, driver.identifier(), None);
                        continue;
                    }

                    let Some(live) = driver.as_live_checker() else {
                        continue;
                    };
                    if state.live_budget == 0 {
                        continue;
                    }
                    state.live_budget -= 1;
                    match live.live_check_hash(entry.hash(), ctx).await {
                        Ok(true) => {
                            state.admit(entry, AdmissionSource::ApiLive, driver.identifier(), None);
                        }
                        Ok(false) => {}
                        Err(err) if err.is_terminal_for_service() => return Err(err.into()),
                        Err(err) => {
                            warn!(tag = %ctx.tag, error = %err, "live check failed, skipping candidate");
                        }
                    }
                }
            }
        }
        Ok(TierFlow::Done)
    }
}
