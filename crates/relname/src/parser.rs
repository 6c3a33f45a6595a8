//! Structured metadata parsed out of a raw release name.

use parking_lot::Mutex;
use regex::Regex;
use release_types::{Codec, Resolution};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::LazyLock;

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap());
static SE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(s\d{1,2}([ ._-]?e\d{1,3})?|season[ ._-]*\d{1,2}|\d{1,2}x\d{2,3})\b")
        .unwrap()
});
static RES_2160: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(2160p|4k|uhd)\b").unwrap());
static RES_1080: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b1080p?\b").unwrap());
static RES_720: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b720p?\b").unwrap());
static RES_480: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(480p|576p|sd)\b").unwrap());
static CODEC_H265: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(hevc|h[ ._-]?265|x265)\b").unwrap());
static CODEC_H264: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(avc|h[ ._-]?264|x264)\b").unwrap());
static SEASON_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:seasons[ ._-]*|s)(\d{1,2})[ ._-]*(?:-|~|to)[ ._-]*s?(\d{1,2})\b")
        .unwrap()
});
static SE_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bs(\d{1,2})[ ._-]?e(\d{1,3})\b").unwrap());
static SEASON_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:season[ ._-]*|s)(\d{1,2})\b").unwrap());

/// Structured fields recovered from a release name. Pure function of input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRelease {
    pub title: Option<String>,
    pub year: Option<u32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Inclusive season range for multi-season packs.
    pub seasons: Vec<u32>,
    pub resolution: Option<Resolution>,
    pub codec: Option<Codec>,
}

impl ParsedRelease {
    /// Whether the name reads as series content rather than a movie.
    pub fn looks_like_series(&self) -> bool {
        self.season.is_some() || self.episode.is_some() || !self.seasons.is_empty()
    }
}

fn detect_resolution(name: &str) -> Option<Resolution> {
    if RES_2160.is_match(name) {
        Some(Resolution::R2160p)
    } else if RES_1080.is_match(name) {
        Some(Resolution::R1080p)
    } else if RES_720.is_match(name) {
        Some(Resolution::R720p)
    } else if RES_480.is_match(name) {
        Some(Resolution::R480p)
    } else {
        None
    }
}

fn detect_codec(name: &str) -> Option<Codec> {
    if CODEC_H265.is_match(name) {
        Some(Codec::H265)
    } else if CODEC_H264.is_match(name) {
        Some(Codec::H264)
    } else {
        None
    }
}

/// The title is whatever precedes the first structural marker (year, episode
/// or season marker, resolution), with separator runs collapsed to spaces.
fn extract_title(name: &str) -> Option<String> {
    let mut cut = name.len();
    for re in [&*YEAR, &*SE_MARKER, &*RES_2160, &*RES_1080, &*RES_720, &*RES_480] {
        if let Some(m) = re.find(name) {
            cut = cut.min(m.start());
        }
    }

    let head = &name[..cut];
    let title = crate::normalize::normalize_title(head);
    if title.is_empty() { None } else { Some(title) }
}

/// Parse a raw release name into structured metadata.
pub fn parse_release_name(name: &str) -> ParsedRelease {
    let mut parsed = ParsedRelease {
        title: extract_title(name),
        year: YEAR
            .captures(name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        resolution: detect_resolution(name),
        codec: detect_codec(name),
        ..ParsedRelease::default()
    };

    if let Some(caps) = SE_PAIR.captures(name) {
        parsed.season = caps.get(1).and_then(|m| m.as_str().parse().ok());
        parsed.episode = caps.get(2).and_then(|m| m.as_str().parse().ok());
    } else if let Some(caps) = SEASON_RANGE.captures(name) {
        if let (Some(a), Some(b)) = (
            caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()),
            caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok()),
        ) && a <= b
        {
            parsed.seasons = (a..=b).collect();
        }
    } else if let Some(caps) = SEASON_ONLY.captures(name) {
        parsed.season = caps.get(1).and_then(|m| m.as_str().parse().ok());
    }

    parsed
}

/// Process-wide memoized parser with a bounded LRU cache.
///
/// The parse is a pure function of its input, so eviction can never produce a
/// stale result.
pub struct MemoizedParser {
    cache: Mutex<lru::LruCache<String, Arc<ParsedRelease>>>,
}

impl MemoizedParser {
    pub const DEFAULT_CAPACITY: usize = 2000;

    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            cache: Mutex::new(lru::LruCache::new(capacity)),
        }
    }

    pub fn parse(&self, name: &str) -> Arc<ParsedRelease> {
        if let Some(hit) = self.cache.lock().get(name) {
            return hit.clone();
        }
        let parsed = Arc::new(parse_release_name(name));
        self.cache.lock().put(name.to_string(), parsed.clone());
        parsed
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

impl Default for MemoizedParser {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_movie_name() {
        let parsed = parse_release_name("Inception.2010.2160p.BluRay.REMUX.HEVC");
        assert_eq!(parsed.title.as_deref(), Some("inception"));
        assert_eq!(parsed.year, Some(2010));
        assert_eq!(parsed.resolution, Some(Resolution::R2160p));
        assert_eq!(parsed.codec, Some(Codec::H265));
        assert!(!parsed.looks_like_series());
    }

    #[test]
    fn parses_episode_name() {
        let parsed = parse_release_name("Severance.S02E05.1080p.WEB-DL.x264");
        assert_eq!(parsed.title.as_deref(), Some("severance"));
        assert_eq!(parsed.season, Some(2));
        assert_eq!(parsed.episode, Some(5));
        assert_eq!(parsed.resolution, Some(Resolution::R1080p));
        assert_eq!(parsed.codec, Some(Codec::H264));
        assert!(parsed.looks_like_series());
    }

    #[test]
    fn parses_season_range() {
        let parsed = parse_release_name("The.Wire.S01-S05.720p.BluRay");
        assert_eq!(parsed.seasons, vec![1, 2, 3, 4, 5]);
        assert!(parsed.looks_like_series());
    }

    #[test]
    fn memoized_parser_bounds_entries() {
        let parser = MemoizedParser::new(2);
        parser.parse("A.2020.1080p");
        parser.parse("B.2021.1080p");
        parser.parse("C.2022.1080p");
        assert_eq!(parser.len(), 2);
    }

    #[test]
    fn memoized_parser_returns_shared_result() {
        let parser = MemoizedParser::default();
        let a = parser.parse("Same.Name.2020.1080p");
        let b = parser.parse("Same.Name.2020.1080p");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
