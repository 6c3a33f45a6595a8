//! Candidate normalization and quality classification.

use crate::config::AdmissionPolicy;
use regex::Regex;
use relname::MemoizedParser;
use release_types::{Category, Codec, ReleaseCandidate, Resolution};
use std::sync::LazyLock;

static RE_REMUX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bremux\b").unwrap());
static RE_RIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(web-?rip|br-?rip|hdrip|dvdrip|camrip)\b").unwrap());
static RE_BLURAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(blu-?ray|bdrip)\b").unwrap());
static RE_WEB: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bweb(-?dl)?\b").unwrap());
static RE_AUDIO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(aac|opus)\b").unwrap());

/// Whether the release advertises an AAC/Opus audio track.
pub(crate) fn has_audio_focus_token(title: &str) -> bool {
    RE_AUDIO.is_match(title)
}

/// Classify the raw title into a quality category.
///
/// With the penalty flag on, AAC/Opus releases are reclassified into
/// `Audio-Focused` regardless of their source tag.
pub(crate) fn classify_category(title: &str, penalize_audio: bool) -> Category {
    if penalize_audio && has_audio_focus_token(title) {
        return Category::AudioFocused;
    }
    if RE_REMUX.is_match(title) {
        Category::Remux
    } else if RE_RIP.is_match(title) {
        Category::WebRip
    } else if RE_BLURAY.is_match(title) {
        Category::BluRay
    } else if RE_WEB.is_match(title) {
        Category::Web
    } else {
        Category::Other
    }
}

/// A candidate after normalization and enrichment. Derived fields depend only
/// on the raw title (and the penalty flag at classification time).
#[derive(Debug, Clone)]
pub(crate) struct Classified {
    pub candidate: ReleaseCandidate,
    pub category: Category,
    pub resolution: Resolution,
    pub codec: Codec,
}

impl Classified {
    pub fn name(&self) -> &str {
        &self.candidate.title
    }

    pub fn hash(&self) -> &str {
        &self.candidate.info_hash
    }

    pub fn size(&self) -> u64 {
        self.candidate.size
    }
}

/// Normalize and enrich the incoming candidates: lowercase the hash, derive
/// category/resolution/codec, drop entries missing hash or name.
pub(crate) fn normalize_and_classify(
    candidates: Vec<ReleaseCandidate>,
    parser: &MemoizedParser,
    policy: &AdmissionPolicy,
) -> Vec<Classified> {
    let mut out = Vec::with_capacity(candidates.len());
    for mut candidate in candidates {
        if candidate.info_hash.trim().is_empty() || candidate.title.trim().is_empty() {
            continue;
        }
        candidate.info_hash = candidate.info_hash.trim().to_ascii_lowercase();

        let parsed = parser.parse(&candidate.title);
        let category = classify_category(&candidate.title, policy.penalize_aac_opus);
        out.push(Classified {
            category,
            resolution: parsed.resolution.unwrap_or(Resolution::Unknown),
            codec: parsed.codec.unwrap_or(Codec::Unknown),
            candidate,
        });
    }
    out
}
