//! The stream cache store.

use crate::database::models::{CacheRecord, CacheRecordRow};
use crate::database::retry::retry_on_busy;
use crate::database::DbPool;
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use release_types::{Category, Resolution};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Aggregate counts of non-expired records for one release key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseCounts {
    pub by_category: HashMap<Category, u32>,
    pub by_category_resolution: HashMap<(Category, Resolution), u32>,
    pub total: u32,
}

/// Key/value store of admission records with TTL semantics.
#[async_trait]
pub trait StreamCacheStore: Send + Sync {
    /// Last-write-wins upsert on `(service, hash)`; `created_at` survives.
    async fn upsert(&self, record: &CacheRecord) -> Result<()>;

    async fn upsert_many(&self, records: &[CacheRecord]) -> Result<()>;

    /// Subset of `hashes` present and unexpired for the service.
    async fn known_cached(&self, service: &str, hashes: &HashSet<String>)
    -> Result<HashSet<String>>;

    async fn record(&self, service: &str, hash: &str) -> Result<Option<CacheRecord>>;

    /// Aggregates non-expired rows for one release key; feeds the next
    /// request's `satisfied_by_db` cheaply.
    async fn release_counts(&self, service: &str, release_key: &str) -> Result<ReleaseCounts>;

    /// Drop rows that came out of searches (rows carrying a release key).
    async fn clear_search_results(&self) -> Result<u64>;

    async fn clear_service(&self, service: &str) -> Result<u64>;

    async fn clear_all(&self) -> Result<u64>;

    /// Remove expired rows; returns how many went away.
    async fn sweep_expired(&self) -> Result<u64>;
}

pub struct SqliteStreamCacheStore {
    pool: DbPool,
    write_pool: DbPool,
}

impl SqliteStreamCacheStore {
    pub fn new(pool: DbPool, write_pool: DbPool) -> Self {
        Self { pool, write_pool }
    }

    async fn upsert_one(&self, record: &CacheRecord, now: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stream_cache
                (service, hash, file_name, size, category, resolution, release_key, data,
                 created_at, updated_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (service, hash) DO UPDATE SET
                file_name = excluded.file_name,
                size = excluded.size,
                category = excluded.category,
                resolution = excluded.resolution,
                release_key = excluded.release_key,
                data = excluded.data,
                updated_at = excluded.updated_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&record.service)
        .bind(&record.hash)
        .bind(&record.file_name)
        .bind(record.size)
        .bind(record.category.map(|c| c.to_string()))
        .bind(record.resolution.map(|r| r.to_string()))
        .bind(&record.release_key)
        .bind(record.data.as_ref().map(|d| d.to_string()))
        .bind(now)
        .bind(now)
        .bind(record.expires_at.timestamp())
        .execute(&self.write_pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StreamCacheStore for SqliteStreamCacheStore {
    async fn upsert(&self, record: &CacheRecord) -> Result<()> {
        let now = Utc::now().timestamp();
        retry_on_busy("upsert", || self.upsert_one(record, now)).await
    }

    async fn upsert_many(&self, records: &[CacheRecord]) -> Result<()> {
        let now = Utc::now().timestamp();
        for record in records {
            retry_on_busy("upsert_many", || self.upsert_one(record, now)).await?;
        }
        debug!(count = records.len(), "flushed cache records");
        Ok(())
    }

    async fn known_cached(
        &self,
        service: &str,
        hashes: &HashSet<String>,
    ) -> Result<HashSet<String>> {
        if hashes.is_empty() {
            return Ok(HashSet::new());
        }

        let placeholders = vec!["?"; hashes.len()].join(", ");
        let sql = format!(
            "SELECT hash FROM stream_cache
             WHERE service = ? AND expires_at > ? AND hash IN ({placeholders})"
        );

        let mut query = sqlx::query_scalar::<_, String>(&sql)
            .bind(service.to_ascii_lowercase())
            .bind(Utc::now().timestamp());
        for hash in hashes {
            query = query.bind(hash.to_ascii_lowercase());
        }

        let known = query.fetch_all(&self.pool).await?;
        Ok(known.into_iter().collect())
    }

    async fn record(&self, service: &str, hash: &str) -> Result<Option<CacheRecord>> {
        let row = sqlx::query_as::<_, CacheRecordRow>(
            "SELECT service, hash, file_name, size, category, resolution, release_key, data,
                    expires_at
             FROM stream_cache WHERE service = ? AND hash = ?",
        )
        .bind(service.to_ascii_lowercase())
        .bind(hash.to_ascii_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CacheRecordRow::into_record))
    }

    async fn release_counts(&self, service: &str, release_key: &str) -> Result<ReleaseCounts> {
        let rows: Vec<(Option<String>, Option<String>, i64)> = sqlx::query_as(
            "SELECT category, resolution, COUNT(*)
             FROM stream_cache
             WHERE service = ? AND release_key = ? AND expires_at > ?
             GROUP BY category, resolution",
        )
        .bind(service.to_ascii_lowercase())
        .bind(release_key)
        .bind(Utc::now().timestamp())
        .fetch_all(&self.pool)
        .await?;

        let mut counts = ReleaseCounts::default();
        for (category, resolution, count) in rows {
            let count = count as u32;
            counts.total += count;
            let Some(category) = category.as_deref().and_then(|s| s.parse::<Category>().ok())
            else {
                continue;
            };
            *counts.by_category.entry(category).or_insert(0) += count;
            if let Some(resolution) =
                resolution.as_deref().and_then(|s| s.parse::<Resolution>().ok())
            {
                *counts
                    .by_category_resolution
                    .entry((category, resolution))
                    .or_insert(0) += count;
            }
        }
        Ok(counts)
    }

    async fn clear_search_results(&self) -> Result<u64> {
        let result = retry_on_busy("clear_search_results", || async {
            Ok(
                sqlx::query("DELETE FROM stream_cache WHERE release_key IS NOT NULL")
                    .execute(&self.write_pool)
                    .await?,
            )
        })
        .await?;
        Ok(result.rows_affected())
    }

    async fn clear_service(&self, service: &str) -> Result<u64> {
        let service = service.to_ascii_lowercase();
        let result = retry_on_busy("clear_service", || {
            let service = service.clone();
            async move {
                Ok(sqlx::query("DELETE FROM stream_cache WHERE service = ?")
                    .bind(service)
                    .execute(&self.write_pool)
                    .await?)
            }
        })
        .await?;
        Ok(result.rows_affected())
    }

    async fn clear_all(&self) -> Result<u64> {
        let result = retry_on_busy("clear_all", || async {
            Ok(sqlx::query("DELETE FROM stream_cache")
                .execute(&self.write_pool)
                .await?)
        })
        .await?;
        Ok(result.rows_affected())
    }

    async fn sweep_expired(&self) -> Result<u64> {
        let result = retry_on_busy("sweep_expired", || async {
            Ok(sqlx::query("DELETE FROM stream_cache WHERE expires_at <= ?")
                .bind(Utc::now().timestamp())
                .execute(&self.write_pool)
                .await?)
        })
        .await?;
        Ok(result.rows_affected())
    }
}

/// No-cache fallback used when the database cannot be opened: reads return
/// empty, writes are dropped. The request path never fails because of the
/// cache.
pub struct NoopStreamCacheStore;

#[async_trait]
impl StreamCacheStore for NoopStreamCacheStore {
    async fn upsert(&self, _record: &CacheRecord) -> Result<()> {
        Ok(())
    }

    async fn upsert_many(&self, _records: &[CacheRecord]) -> Result<()> {
        Ok(())
    }

    async fn known_cached(
        &self,
        _service: &str,
        _hashes: &HashSet<String>,
    ) -> Result<HashSet<String>> {
        Ok(HashSet::new())
    }

    async fn record(&self, _service: &str, _hash: &str) -> Result<Option<CacheRecord>> {
        Ok(None)
    }

    async fn release_counts(&self, _service: &str, _release_key: &str) -> Result<ReleaseCounts> {
        Ok(ReleaseCounts::default())
    }

    async fn clear_search_results(&self) -> Result<u64> {
        Ok(0)
    }

    async fn clear_service(&self, _service: &str) -> Result<u64> {
        Ok(0)
    }

    async fn clear_all(&self) -> Result<u64> {
        Ok(0)
    }

    async fn sweep_expired(&self) -> Result<u64> {
        Ok(0)
    }
}
