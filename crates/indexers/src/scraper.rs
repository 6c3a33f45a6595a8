//! The scraper driver trait.

use async_trait::async_trait;
use release_types::{ReleaseCandidate, StreamKind};
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("search cancelled")]
    Cancelled,

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("indexer answered HTTP {status}")]
    Status { status: reqwest::StatusCode },

    #[error("invalid indexer URL: {reason}")]
    InvalidUrl { reason: String },
}

/// One search request as seen by a scraper.
#[derive(Debug, Clone)]
pub struct ScrapeQuery {
    pub kind: StreamKind,
    /// Content id the query was derived from (imdb id, etc.).
    pub id: String,
    /// Free-text search key, e.g. `"severance s02 e05"`.
    pub text: String,
    /// Language hint; `None` means unfiltered.
    pub language: Option<String>,
}

/// Per-call context: cancellation signal plus a log tag.
#[derive(Debug, Clone)]
pub struct ScrapeContext {
    pub cancel: CancellationToken,
    pub tag: String,
}

impl ScrapeContext {
    pub fn new(cancel: CancellationToken, tag: impl Into<String>) -> Self {
        Self {
            cancel,
            tag: tag.into(),
        }
    }
}

#[async_trait]
pub trait Scraper: Send + Sync {
    /// Stable name for logging and enable/disable configuration.
    fn name(&self) -> &str;

    async fn search(
        &self,
        query: &ScrapeQuery,
        ctx: &ScrapeContext,
    ) -> Result<Vec<ReleaseCandidate>, ScrapeError>;
}
