//! Shared domain types for release discovery and stream admission.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::EnumIter;

/// What kind of content a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Movie,
    Series,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Series => write!(f, "series"),
        }
    }
}

/// The episode a series request is after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeTarget {
    pub season: u32,
    pub episode: u32,
}

impl EpisodeTarget {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }
}

/// Quality bucket a release is classified into from its raw name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
pub enum Category {
    Remux,
    BluRay,
    Web,
    WebRip,
    AudioFocused,
    Other,
}

impl Category {
    /// Relative quality used when ordering season packs for inspection.
    pub fn quality_score(self) -> u8 {
        match self {
            Self::Remux => 5,
            Self::BluRay => 4,
            Self::Web => 3,
            Self::WebRip => 2,
            Self::Other => 1,
            Self::AudioFocused => 0,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Remux => "Remux",
            Self::BluRay => "BluRay",
            Self::Web => "WEB/WEB-DL",
            Self::WebRip => "BRRip/WEBRip",
            Self::AudioFocused => "Audio-Focused",
            Self::Other => "Other",
        };
        write!(f, "{label}")
    }
}

impl FromStr for Category {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Remux" => Ok(Self::Remux),
            "BluRay" => Ok(Self::BluRay),
            "WEB/WEB-DL" => Ok(Self::Web),
            "BRRip/WEBRip" => Ok(Self::WebRip),
            "Audio-Focused" => Ok(Self::AudioFocused),
            "Other" => Ok(Self::Other),
            other => Err(ParseLabelError {
                kind: "category",
                value: other.to_string(),
            }),
        }
    }
}

/// Vertical resolution bucket parsed from a release name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
pub enum Resolution {
    R2160p,
    R1080p,
    R720p,
    R480p,
    Unknown,
}

impl Resolution {
    /// Relative ranking used when ordering season packs for inspection.
    pub fn score(self) -> u8 {
        match self {
            Self::R2160p => 4,
            Self::R1080p => 3,
            Self::R720p => 2,
            Self::R480p => 1,
            Self::Unknown => 0,
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::R2160p => "2160p",
            Self::R1080p => "1080p",
            Self::R720p => "720p",
            Self::R480p => "480p",
            Self::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

impl FromStr for Resolution {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2160p" => Ok(Self::R2160p),
            "1080p" => Ok(Self::R1080p),
            "720p" => Ok(Self::R720p),
            "480p" => Ok(Self::R480p),
            "unknown" => Ok(Self::Unknown),
            other => Err(ParseLabelError {
                kind: "resolution",
                value: other.to_string(),
            }),
        }
    }
}

/// Video codec family parsed from a release name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
pub enum Codec {
    H265,
    H264,
    Unknown,
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::H265 => "h265",
            Self::H264 => "h264",
            Self::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// A discovered potential stream, as produced by indexer scrapers.
///
/// `info_hash` is the canonical key: 40 hex characters, lowercased during
/// engine normalization. Quality classification is derived later from `title`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCandidate {
    pub info_hash: String,
    pub title: String,
    pub size: u64,
    pub tracker: String,
    pub seeders: Option<u32>,
    #[serde(default)]
    pub languages: Vec<String>,
}

impl ReleaseCandidate {
    pub fn new(info_hash: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            info_hash: info_hash.into(),
            title: title.into(),
            size: 0,
            tracker: String::new(),
            seeders: None,
            languages: Vec::new(),
        }
    }
}

/// File hint attached to an admitted season pack so the resolve step can pick
/// the exact episode file without re-inspecting the torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackHint {
    pub file_path: String,
    pub file_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

/// How the engine confirmed a candidate was cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionSource {
    ApiBatch,
    ApiLive,
    BatchPackInspection,
}

impl std::fmt::Display for AdmissionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::ApiBatch => "API Batch",
            Self::ApiLive => "API Live",
            Self::BatchPackInspection => "Batch Pack Inspection",
        };
        write!(f, "{label}")
    }
}

/// An admitted candidate, ready to be returned upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmittedStream {
    pub info_hash: String,
    pub title: String,
    pub size: u64,
    /// Stable label of the debrid service that confirmed the hash.
    pub source: String,
    pub tracker: String,
    pub languages: Vec<String>,
    pub is_cached: bool,
    pub from: AdmissionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_file_hint: Option<PackHint>,
    pub category: Category,
    pub resolution: Resolution,
    pub codec: Codec,
}

/// Error for round-tripping display labels back into enums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for ParseLabelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unrecognized {} label `{}`", self.kind, self.value)
    }
}

impl std::error::Error for ParseLabelError {}
