//! Row types and their domain mapping.

use chrono::{DateTime, TimeZone, Utc};
use release_types::{Category, Resolution};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One persisted `(service, hash)` admission record.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub service: String,
    pub hash: String,
    pub file_name: Option<String>,
    pub size: Option<i64>,
    pub category: Option<Category>,
    pub resolution: Option<Resolution>,
    /// Opaque query key used to bucket records for aggregate counts.
    pub release_key: Option<String>,
    pub data: Option<serde_json::Value>,
    pub expires_at: DateTime<Utc>,
}

impl CacheRecord {
    pub fn new(service: impl Into<String>, hash: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            service: service.into().to_ascii_lowercase(),
            hash: hash.into().to_ascii_lowercase(),
            file_name: None,
            size: None,
            category: None,
            resolution: None,
            release_key: None,
            data: None,
            expires_at,
        }
    }
}

/// Free-form payload stored alongside admission records. Season packs carry
/// the episode file hint, home-media rows carry their file listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_file_hint: Option<release_types::PackHint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<StoredFile>>,
}

/// One file inside an indexed home-media torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub path: String,
    pub bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CacheRecordRow {
    pub service: String,
    pub hash: String,
    pub file_name: Option<String>,
    pub size: Option<i64>,
    pub category: Option<String>,
    pub resolution: Option<String>,
    pub release_key: Option<String>,
    pub data: Option<String>,
    pub expires_at: i64,
}

impl CacheRecordRow {
    pub fn into_record(self) -> CacheRecord {
        CacheRecord {
            service: self.service,
            hash: self.hash,
            file_name: self.file_name,
            size: self.size,
            category: self.category.as_deref().and_then(|s| s.parse().ok()),
            resolution: self.resolution.as_deref().and_then(|s| s.parse().ok()),
            release_key: self.release_key,
            data: self
                .data
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok()),
            expires_at: Utc
                .timestamp_opt(self.expires_at, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_round_trips_labels() {
        let row = CacheRecordRow {
            service: "homemedia".to_string(),
            hash: "a".repeat(40),
            file_name: Some("Show.S02E05.mkv".to_string()),
            size: Some(1234),
            category: Some("WEB/WEB-DL".to_string()),
            resolution: Some("1080p".to_string()),
            release_key: Some("series:tt1:2:5".to_string()),
            data: None,
            expires_at: 1_900_000_000,
        };
        let record = row.into_record();
        assert_eq!(record.category, Some(Category::Web));
        assert_eq!(record.resolution, Some(Resolution::R1080p));
        assert_eq!(record.expires_at.timestamp(), 1_900_000_000);
    }
}
