//! Generic adapter for Jackett-style aggregate JSON endpoints.

use crate::scraper::{ScrapeContext, ScrapeError, ScrapeQuery, Scraper};
use async_trait::async_trait;
use release_types::{ReleaseCandidate, StreamKind};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

// Torznab category ids: movies and tv respectively.
const CAT_MOVIES: &str = "2000";
const CAT_TV: &str = "5000";

#[derive(Debug, Deserialize)]
struct ResultsEnvelope {
    #[serde(rename = "Results", default)]
    results: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(rename = "Title", default)]
    title: String,
    #[serde(rename = "InfoHash")]
    info_hash: Option<String>,
    #[serde(rename = "Size", default)]
    size: u64,
    #[serde(rename = "Seeders")]
    seeders: Option<u32>,
    #[serde(rename = "Tracker", default)]
    tracker: String,
    #[serde(rename = "Languages", default)]
    languages: Vec<String>,
}

pub struct JackettScraper {
    name: String,
    base_url: Url,
    api_key: String,
    client: Client,
}

impl JackettScraper {
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        api_key: impl Into<String>,
        client: Client,
    ) -> Result<Self, ScrapeError> {
        let base_url = Url::parse(base_url).map_err(|e| ScrapeError::InvalidUrl {
            reason: e.to_string(),
        })?;
        Ok(Self {
            name: name.into(),
            base_url,
            api_key: api_key.into(),
            client,
        })
    }

    fn build_url(&self, query: &ScrapeQuery) -> Result<Url, ScrapeError> {
        let mut url = self
            .base_url
            .join("api/v2.0/indexers/all/results")
            .map_err(|e| ScrapeError::InvalidUrl {
                reason: e.to_string(),
            })?;

        let category = match query.kind {
            StreamKind::Movie => CAT_MOVIES,
            StreamKind::Series => CAT_TV,
        };

        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("Query", &query.text)
            .append_pair("Category[]", category);
        Ok(url)
    }
}

#[async_trait]
impl Scraper for JackettScraper {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &ScrapeQuery,
        ctx: &ScrapeContext,
    ) -> Result<Vec<ReleaseCandidate>, ScrapeError> {
        let url = self.build_url(query)?;

        let request = self.client.get(url).send();
        let response = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(ScrapeError::Cancelled),
            response = request => response?,
        };

        if !response.status().is_success() {
            return Err(ScrapeError::Status {
                status: response.status(),
            });
        }

        let envelope = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(ScrapeError::Cancelled),
            body = response.json::<ResultsEnvelope>() => body?,
        };

        let mut candidates = Vec::with_capacity(envelope.results.len());
        let mut skipped = 0usize;
        for raw in envelope.results {
            // Usenet rows and magnetless torrents carry no info-hash; they
            // cannot go through cache admission.
            let Some(info_hash) = raw.info_hash.filter(|h| !h.is_empty()) else {
                skipped += 1;
                continue;
            };
            candidates.push(ReleaseCandidate {
                info_hash,
                title: raw.title,
                size: raw.size,
                tracker: raw.tracker,
                seeders: raw.seeders,
                languages: raw.languages,
            });
        }

        if skipped > 0 {
            warn!(tag = %ctx.tag, scraper = %self.name, skipped, "dropped results without info-hash");
        }
        debug!(tag = %ctx.tag, scraper = %self.name, count = candidates.len(), "indexer search done");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_query_url_with_category() {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        let scraper = JackettScraper::new(
            "jackett",
            "http://localhost:9117/",
            "key",
            Client::new(),
        )
        .unwrap();
        let url = scraper
            .build_url(&ScrapeQuery {
                kind: StreamKind::Series,
                id: "tt0000".into(),
                text: "severance s02 e05".into(),
                language: None,
            })
            .unwrap();
        let serialized = url.to_string();
        assert!(serialized.contains("Query=severance+s02+e05"));
        assert!(serialized.contains("Category%5B%5D=5000"));
    }

    #[test]
    fn envelope_parses_and_skips_hashless_rows() {
        let json = r#"{"Results":[
            {"Title":"Show.S02E05.1080p","InfoHash":"abc","Size":123,"Seeders":5,"Tracker":"t1"},
            {"Title":"Show.S02E05.nzb","Size":456,"Tracker":"usenet"}
        ]}"#;
        let envelope: ResultsEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.results.len(), 2);
        assert!(envelope.results[0].info_hash.is_some());
        assert!(envelope.results[1].info_hash.is_none());
    }
}
