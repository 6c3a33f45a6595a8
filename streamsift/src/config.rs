//! Environment-driven application configuration.
//!
//! Every knob has a default; `.env` files are honored via dotenvy. The
//! summary string feeds coordination keys so that two requests with different
//! effective policies never share a search.

use crate::{Error, Result};
use sift_engine::{AdmissionPolicy, CoordinatorConfig, HttpSettings, QuotaPlan};
use release_types::{Category, Codec};
use std::path::PathBuf;
use std::time::Duration;

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::config(format!("invalid value for {key}: `{raw}`"))),
        None => Ok(default),
    }
}

fn env_opt_u32(key: &str) -> Result<Option<u32>> {
    env_string(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| Error::config(format!("invalid value for {key}: `{raw}`")))
        })
        .transpose()
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match env_string(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(Error::config(format!(
                "invalid boolean for {key}: `{other}`"
            ))),
        },
        None => Ok(default),
    }
}

fn env_csv(key: &str) -> Vec<String> {
    env_string(key)
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub cache_ttl: Duration,
    pub sweep_interval: Duration,

    pub max_results_per_quality: u32,
    pub max_results_remux: Option<u32>,
    pub max_results_bluray: Option<u32>,
    pub max_results_webdl: Option<u32>,
    pub max_results_webrip: Option<u32>,
    pub max_results_audio: Option<u32>,
    pub max_results_other: Option<u32>,

    pub max_packs_to_inspect: usize,
    pub max_pack_rounds: usize,
    pub max_live_checks: u32,
    pub split_pack_quotas: bool,

    pub skip_webrip: bool,
    pub skip_aac_opus: bool,
    pub penalize_aac_opus: bool,
    pub diversify_codecs: bool,
    pub max_h265_per_quality: u32,
    pub max_h264_per_quality: u32,
    pub target_codec_count: u32,

    pub coordinator_timeout: Duration,
    pub scraper_share_ttl: Duration,
    pub scraper_share_cap: usize,
    pub fatal_scraper_errors: bool,

    pub languages: Vec<String>,
    pub debrid_services: Vec<String>,
    pub jackett_url: Option<String>,
    pub jackett_api_key: Option<String>,
}

impl AppConfig {
    /// Load from process environment (plus `.env` when present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            data_dir: PathBuf::from(
                env_string("DATA_DIR").unwrap_or_else(|| "data".to_string()),
            ),
            log_dir: PathBuf::from(env_string("LOG_DIR").unwrap_or_else(|| "logs".to_string())),
            cache_ttl: Duration::from_secs(
                u64::from(env_parse::<u32>("CACHE_TTL_DAYS", 30)?) * 24 * 60 * 60,
            ),
            sweep_interval: Duration::from_secs(30 * 60),

            max_results_per_quality: env_parse("MAX_RESULTS_PER_QUALITY", 2)?,
            max_results_remux: env_opt_u32("MAX_RESULTS_REMUX")?,
            max_results_bluray: env_opt_u32("MAX_RESULTS_BLURAY")?,
            max_results_webdl: env_opt_u32("MAX_RESULTS_WEBDL")?,
            max_results_webrip: env_opt_u32("MAX_RESULTS_WEBRIP")?,
            max_results_audio: env_opt_u32("MAX_RESULTS_AUDIO")?,
            max_results_other: env_opt_u32("MAX_RESULTS_OTHER")?,

            max_packs_to_inspect: env_parse("MAX_PACKS_TO_INSPECT", 5)?,
            max_pack_rounds: env_parse("MAX_PACK_ROUNDS", 3)?,
            max_live_checks: env_parse("MAX_LIVE_CHECKS", 15)?,
            split_pack_quotas: env_bool("SPLIT_PACK_QUOTAS", false)?,

            skip_webrip: env_bool("PRIORITY_SKIP_WEBRIP_ENABLED", false)?,
            skip_aac_opus: env_bool("PRIORITY_SKIP_AAC_OPUS_ENABLED", false)?,
            penalize_aac_opus: env_bool("PRIORITY_PENALTY_AAC_OPUS_ENABLED", false)?,
            diversify_codecs: env_bool("DIVERSIFY_CODECS_ENABLED", false)?,
            max_h265_per_quality: env_parse("MAX_H265_RESULTS_PER_QUALITY", 2)?,
            max_h264_per_quality: env_parse("MAX_H264_RESULTS_PER_QUALITY", 2)?,
            target_codec_count: env_parse("TARGET_CODEC_COUNT", 0)?,

            coordinator_timeout: Duration::from_secs(u64::from(env_parse::<u32>(
                "COORDINATOR_TIMEOUT_SECONDS",
                30,
            )?)),
            scraper_share_ttl: Duration::from_secs(u64::from(env_parse::<u32>(
                "SCRAPER_SHARE_TTL_SECONDS",
                60,
            )?)),
            scraper_share_cap: env_parse("SCRAPER_SHARE_CAP", 500)?,
            fatal_scraper_errors: env_bool("SCRAPER_FATAL_ERRORS_ENABLED", false)?,

            languages: env_csv("SCRAPER_LANGUAGES"),
            debrid_services: env_csv("DEBRID_SERVICES"),
            jackett_url: env_string("JACKETT_URL"),
            jackett_api_key: env_string("JACKETT_API_KEY"),
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("streamsift.db")
    }

    /// Per-category limits with overrides applied, no DB contributions yet.
    pub fn base_quota_plan(&self) -> QuotaPlan {
        let default = self.max_results_per_quality;
        QuotaPlan::builder()
            .category_limit(Category::Remux, self.max_results_remux.unwrap_or(default))
            .category_limit(Category::BluRay, self.max_results_bluray.unwrap_or(default))
            .category_limit(Category::Web, self.max_results_webdl.unwrap_or(default))
            .category_limit(Category::WebRip, self.max_results_webrip.unwrap_or(1))
            .category_limit(Category::AudioFocused, self.max_results_audio.unwrap_or(1))
            .category_limit(Category::Other, self.max_results_other.unwrap_or(10))
            .codec_limit(Codec::H265, self.max_h265_per_quality)
            .codec_limit(Codec::H264, self.max_h264_per_quality)
            .global_resolution_cap(self.target_codec_count)
            .build()
    }

    pub fn admission_policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            skip_webrip: self.skip_webrip,
            skip_aac_opus: self.skip_aac_opus,
            penalize_aac_opus: self.penalize_aac_opus,
            diversify_codecs: self.diversify_codecs,
            max_packs_to_inspect: self.max_packs_to_inspect,
            max_pack_rounds: self.max_pack_rounds,
            max_live_checks: self.max_live_checks,
            split_pack_quotas: self.split_pack_quotas,
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            search_timeout: self.coordinator_timeout,
            share_ttl: self.scraper_share_ttl,
            share_cap: self.scraper_share_cap,
            ..CoordinatorConfig::default()
        }
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings::default()
    }

    /// Compact fingerprint of the knobs that change search results; part of
    /// every coordination key.
    pub fn summary(&self) -> String {
        format!(
            "q{}:r{}:b{}:w{}:wr{}:a{}:o{}:skips{}{}{}:div{}:h265-{}:h264-{}:cap{}:langs[{}]",
            self.max_results_per_quality,
            self.max_results_remux.unwrap_or(self.max_results_per_quality),
            self.max_results_bluray.unwrap_or(self.max_results_per_quality),
            self.max_results_webdl.unwrap_or(self.max_results_per_quality),
            self.max_results_webrip.unwrap_or(1),
            self.max_results_audio.unwrap_or(1),
            self.max_results_other.unwrap_or(10),
            u8::from(self.skip_webrip),
            u8::from(self.skip_aac_opus),
            u8::from(self.penalize_aac_opus),
            u8::from(self.diversify_codecs),
            self.max_h265_per_quality,
            self.max_h264_per_quality,
            self.target_codec_count,
            self.languages.join("+"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_environment() {
        // Env-free construction: rely on defaults only.
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.max_packs_to_inspect, 5);
        assert_eq!(config.max_pack_rounds, 3);
        assert_eq!(config.coordinator_timeout, Duration::from_secs(30));
        assert_eq!(config.scraper_share_cap, 500);
        assert_eq!(config.cache_ttl, Duration::from_secs(30 * 24 * 60 * 60));
    }

    #[test]
    fn summary_differs_when_policy_differs() {
        let a = AppConfig::from_env().unwrap();
        let mut b = a.clone();
        b.diversify_codecs = !b.diversify_codecs;
        assert_ne!(a.summary(), b.summary());
    }
}
