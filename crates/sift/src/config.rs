//! Engine configuration: quota plans, admission policy and service knobs.

use release_types::{Category, Codec, Resolution};
use std::collections::HashMap;
use std::time::Duration;
use strum::IntoEnumIterator;

/// Resolved per-request quota limits.
#[derive(Debug, Clone)]
pub struct QuotaPlan {
    per_category: HashMap<Category, u32>,
    /// Counts already contributed by personal files, keyed by
    /// `(category, resolution)`. The engine subtracts these before counting
    /// external admissions.
    satisfied_by_db: HashMap<(Category, Resolution), u32>,
    per_codec_max: HashMap<Codec, u32>,
    /// Cap on admitted externals per resolution; 0 disables the cap.
    global_resolution_cap: u32,
}

impl Default for QuotaPlan {
    fn default() -> Self {
        let mut per_category = HashMap::new();
        per_category.insert(Category::Remux, 2);
        per_category.insert(Category::BluRay, 2);
        per_category.insert(Category::Web, 2);
        per_category.insert(Category::WebRip, 1);
        per_category.insert(Category::AudioFocused, 1);
        per_category.insert(Category::Other, 10);

        let mut per_codec_max = HashMap::new();
        per_codec_max.insert(Codec::H265, 2);
        per_codec_max.insert(Codec::H264, 2);

        Self {
            per_category,
            satisfied_by_db: HashMap::new(),
            per_codec_max,
            global_resolution_cap: 0,
        }
    }
}

impl QuotaPlan {
    pub fn builder() -> QuotaPlanBuilder {
        QuotaPlanBuilder {
            plan: Self::default(),
        }
    }

    pub fn per_category(&self, category: Category) -> u32 {
        self.per_category.get(&category).copied().unwrap_or(0)
    }

    pub fn satisfied_by_db(&self, category: Category, resolution: Resolution) -> u32 {
        self.satisfied_by_db
            .get(&(category, resolution))
            .copied()
            .unwrap_or(0)
    }

    /// External admissions still allowed for one `(category, resolution)`
    /// bucket after subtracting what personal files already cover.
    pub fn remaining_need(&self, category: Category, resolution: Resolution) -> u32 {
        self.per_category(category)
            .saturating_sub(self.satisfied_by_db(category, resolution))
    }

    /// Record counts already contributed by personal files, typically read
    /// from the persistent cache just before the engine runs.
    pub fn set_satisfied_by_db(&mut self, category: Category, resolution: Resolution, count: u32) {
        self.satisfied_by_db.insert((category, resolution), count);
    }

    pub fn per_codec_max(&self, codec: Codec) -> u32 {
        self.per_codec_max.get(&codec).copied().unwrap_or(u32::MAX)
    }

    pub fn global_resolution_cap(&self) -> u32 {
        self.global_resolution_cap
    }

    /// True when no `(category, resolution)` bucket can take any external
    /// admission at all, which lets the engine return without touching the
    /// driver.
    pub fn fully_satisfied(&self) -> bool {
        Category::iter()
            .all(|c| Resolution::iter().all(|r| self.remaining_need(c, r) == 0))
    }
}

#[derive(Debug, Clone)]
pub struct QuotaPlanBuilder {
    plan: QuotaPlan,
}

impl QuotaPlanBuilder {
    pub fn category_limit(mut self, category: Category, limit: u32) -> Self {
        self.plan.per_category.insert(category, limit);
        self
    }

    pub fn satisfied_by_db(
        mut self,
        category: Category,
        resolution: Resolution,
        count: u32,
    ) -> Self {
        self.plan
            .satisfied_by_db
            .insert((category, resolution), count);
        self
    }

    pub fn codec_limit(mut self, codec: Codec, limit: u32) -> Self {
        self.plan.per_codec_max.insert(codec, limit);
        self
    }

    pub fn global_resolution_cap(mut self, cap: u32) -> Self {
        self.plan.global_resolution_cap = cap;
        self
    }

    pub fn build(self) -> QuotaPlan {
        self.plan
    }
}

/// Policy switches applied during the admission walk.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    /// Hard-drop BRRip/WEBRip candidates.
    pub skip_webrip: bool,
    /// Hard-drop AAC/Opus releases.
    pub skip_aac_opus: bool,
    /// Reclassify AAC/Opus releases into `Audio-Focused`.
    pub penalize_aac_opus: bool,
    /// Enforce per-codec caps per resolution.
    pub diversify_codecs: bool,
    pub max_packs_to_inspect: usize,
    pub max_pack_rounds: usize,
    /// Per-request budget for single-hash live checks; once spent, batch
    /// misses are final.
    pub max_live_checks: u32,
    /// When set, season packs are counted against their own quota buckets
    /// instead of sharing counters with specific-episode admissions.
    pub split_pack_quotas: bool,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            skip_webrip: false,
            skip_aac_opus: false,
            penalize_aac_opus: false,
            diversify_codecs: false,
            max_packs_to_inspect: 5,
            max_pack_rounds: 3,
            max_live_checks: 15,
            split_pack_quotas: false,
        }
    }
}

/// Transport knobs for the shared HTTP client.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Concurrent socket bound per upstream host.
    pub max_sockets_per_host: usize,
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
    /// Default per-request timeout; callers needing more build their own
    /// request-level timeout on top.
    pub request_timeout: Duration,
    /// Age after which the transport is recreated and the old one drained.
    pub transport_max_age: Duration,
    /// Consecutive non-success outcomes before proxy routing adapts.
    pub streak_threshold: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            max_sockets_per_host: 100,
            max_idle_per_host: 20,
            idle_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            transport_max_age: Duration::from_secs(300),
            streak_threshold: 5,
        }
    }
}

/// Knobs for the search coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Hard cap on one coordinated search.
    pub search_timeout: Duration,
    /// How long scraper output is shared across services.
    pub share_ttl: Duration,
    /// Bound on the scraper-share map.
    pub share_cap: usize,
    pub sweep_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            search_timeout: Duration::from_secs(30),
            share_ttl: Duration::from_secs(60),
            share_cap: 500,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Fanout behavior switches.
#[derive(Debug, Clone, Default)]
pub struct FanoutPolicy {
    /// When set, the first scraper error cancels sibling scrapers instead of
    /// degrading to an empty list.
    pub fatal_error_cancels_siblings: bool,
}
