//! Episode and season-pack markers.
//!
//! All detection is regex-driven and case-insensitive. The `regex` crate has
//! no lookaround, so "sNN alone" is expressed as a season match plus the
//! absence of any episode marker rather than a negative lookahead.

use regex::Regex;
use std::sync::LazyLock;

static SE_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bs(\d{1,2})[ ._-]?e(\d{1,3})\b").unwrap());
static SEASON_EPISODE_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bseason[ ._-]*(\d{1,2})[ ._-]*episode[ ._-]*(\d{1,3})\b").unwrap()
});
static CROSS_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})x(\d{2,3})\b").unwrap());
static EP_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bep\.?[ ._-]*(\d{1,3})\b").unwrap());
static SEASON_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bseason[ ._-]*(\d{1,2})\b").unwrap());
static S_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bs(\d{1,2})\b").unwrap());
static MULTI_SEASON_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bseasons[ ._-]*(\d{1,2})[ ._-]*(?:-|~|to)[ ._-]*(\d{1,2})\b").unwrap()
});
static MULTI_SEASON_SHORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bs(\d{1,2})[ ._-]*-[ ._-]*s?(\d{1,2})\b").unwrap());

fn cap_u32(caps: &regex::Captures<'_>, idx: usize) -> Option<u32> {
    caps.get(idx)?.as_str().parse().ok()
}

/// Every `(season, episode)` pair spelled out in the name.
fn se_pairs(name: &str) -> Vec<(u32, u32)> {
    let mut pairs = Vec::new();
    for re in [&*SE_PAIR, &*SEASON_EPISODE_WORDS, &*CROSS_PAIR] {
        for caps in re.captures_iter(name) {
            if let (Some(s), Some(e)) = (cap_u32(&caps, 1), cap_u32(&caps, 2)) {
                pairs.push((s, e));
            }
        }
    }
    pairs
}

/// Bare `Ep.NN` style episode numbers (no season attached).
fn ep_numbers(name: &str) -> Vec<u32> {
    EP_ONLY
        .captures_iter(name)
        .filter_map(|caps| cap_u32(&caps, 1))
        .collect()
}

/// True when the name names exactly the target episode: `SxxEyy`,
/// `season N episode M`, `NxMM`, or `Ep.NN`, zero-padded or not.
pub fn has_episode_marker(name: &str, season: u32, episode: u32) -> bool {
    if se_pairs(name).contains(&(season, episode)) {
        return true;
    }
    ep_numbers(name).contains(&episode)
}

/// True when the name carries an episode marker for some *other* episode.
/// Names with no episode marker at all return false.
pub fn matches_other_episode(name: &str, season: u32, episode: u32) -> bool {
    let pairs = se_pairs(name);
    if pairs.iter().any(|&(s, e)| s != season || e != episode) {
        return true;
    }
    // Bare episode numbers only disambiguate when no full pair said otherwise.
    if pairs.is_empty() {
        return ep_numbers(name).iter().any(|&e| e != episode);
    }
    false
}

/// True for a single-season pack of the target season: `season N` or `sNN`
/// with no episode marker anywhere in the name.
pub fn is_season_pack(name: &str, season: u32) -> bool {
    if !se_pairs(name).is_empty() || !ep_numbers(name).is_empty() {
        return false;
    }

    let season_match = SEASON_ONLY
        .captures_iter(name)
        .chain(S_ONLY.captures_iter(name))
        .filter_map(|caps| cap_u32(&caps, 1))
        .any(|s| s == season);

    season_match
}

/// True for `seasons A-B` / `sA-sB` ranges that cover the target season.
pub fn is_relevant_multi_season_pack(name: &str, season: u32) -> bool {
    for re in [&*MULTI_SEASON_WORDS, &*MULTI_SEASON_SHORT] {
        for caps in re.captures_iter(name) {
            if let (Some(a), Some(b)) = (cap_u32(&caps, 1), cap_u32(&caps, 2))
                && a <= b
                && a <= season
                && season <= b
            {
                return true;
            }
        }
    }
    false
}
