//! Canonical title/year lookup.

use crate::Result;
use async_trait::async_trait;
use release_types::StreamKind;
use serde::Deserialize;
use sift_engine::SharedHttp;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Canonical metadata for one content id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaInfo {
    pub title: String,
    pub year: Option<u32>,
}

/// Read-only metadata collaborator. `None` means the id is unknown or the
/// upstream is unavailable; the facade turns that into an empty result.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn get_meta(
        &self,
        kind: StreamKind,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<MetaInfo>>;
}

#[derive(Debug, Deserialize)]
struct MetaEnvelope {
    meta: Option<MetaPayload>,
}

#[derive(Debug, Deserialize)]
struct MetaPayload {
    name: String,
    /// Movies carry `"2010"`, running series `"2010-"` or `"2010-2015"`.
    year: Option<serde_json::Value>,
}

impl MetaPayload {
    fn year_number(&self) -> Option<u32> {
        let raw = match &self.year {
            Some(serde_json::Value::Number(n)) => return n.as_u64().map(|y| y as u32),
            Some(serde_json::Value::String(s)) => s.as_str(),
            _ => return None,
        };
        let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }
}

/// Cinemeta-style HTTP metadata client on the shared transport.
pub struct CinemetaClient {
    http: Arc<SharedHttp>,
    base_url: String,
}

const UPSTREAM: &str = "cinemeta";

impl CinemetaClient {
    pub fn new(http: Arc<SharedHttp>) -> Self {
        Self {
            http,
            base_url: "https://v3-cinemeta.strem.io".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl MetadataProvider for CinemetaClient {
    async fn get_meta(
        &self,
        kind: StreamKind,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<MetaInfo>> {
        let url = format!("{}/meta/{kind}/{id}.json", self.base_url);

        let response = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            response = self.http.execute(UPSTREAM, |client| client.get(&url)) => response,
        };

        // Metadata being down degrades the request to "no results", it never
        // fails it.
        let response = match response {
            Ok(response) => response,
            Err(err) => {
                warn!(id, error = %err, "metadata lookup failed");
                return Ok(None);
            }
        };
        if !response.status().is_success() {
            return Ok(None);
        }

        let envelope = match response.json::<MetaEnvelope>().await {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(id, error = %err, "metadata payload unreadable");
                return Ok(None);
            }
        };

        Ok(envelope.meta.map(|payload| MetaInfo {
            year: payload.year_number(),
            title: payload.name,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_parses_numbers_and_ranges() {
        let payload = |value: serde_json::Value| MetaPayload {
            name: "X".to_string(),
            year: Some(value),
        };
        assert_eq!(payload(serde_json::json!(2010)).year_number(), Some(2010));
        assert_eq!(payload(serde_json::json!("2010")).year_number(), Some(2010));
        assert_eq!(
            payload(serde_json::json!("2010-2015")).year_number(),
            Some(2010)
        );
        assert_eq!(payload(serde_json::json!("")).year_number(), None);
    }
}
