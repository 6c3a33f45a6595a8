//! The driver capability surface.

use async_trait::async_trait;
use release_types::PackHint;
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;

/// Errors a driver may surface past its own boundary.
///
/// Transient upstream trouble is *not* represented here: per contract, batch
/// checks degrade to an empty set and live checks to `false` when the vendor
/// wobbles. Only faults that should stop using the service for the rest of
/// the request escape.
#[derive(Debug, thiserror::Error)]
pub enum DebridError {
    #[error("{service}: authentication rejected")]
    Auth { service: &'static str },

    #[error("vendor `{vendor}` is not configured")]
    NotConfigured { vendor: String },

    #[error("{service}: driver fault: {reason}")]
    Driver {
        service: &'static str,
        reason: String,
    },
}

impl DebridError {
    pub fn driver(service: &'static str, reason: impl Into<String>) -> Self {
        Self::Driver {
            service,
            reason: reason.into(),
        }
    }

    /// Whether this error ends the request for this service only (the facade
    /// keeps other services running).
    pub fn is_terminal_for_service(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// Per-call context handed into every driver method: the request-scoped
/// cancellation signal and a tag for log correlation.
#[derive(Debug, Clone)]
pub struct DriverContext {
    pub cancel: CancellationToken,
    pub tag: String,
}

impl DriverContext {
    pub fn new(cancel: CancellationToken, tag: impl Into<String>) -> Self {
        Self {
            cancel,
            tag: tag.into(),
        }
    }
}

/// Optional capability: slower single-hash fallback used when the batch check
/// did not confirm a candidate the engine still wants.
#[async_trait]
pub trait LiveCacheCheck: Send + Sync {
    async fn live_check_hash(&self, hash: &str, ctx: &DriverContext)
    -> Result<bool, DebridError>;
}

/// Optional capability: for each provided pack hash, report whether the pack
/// actually contains the target episode and, if so, a hint for later file
/// resolution. Hashes the vendor could not resolve map to `None`.
#[async_trait]
pub trait SeasonPackInspect: Send + Sync {
    async fn batch_inspect_season_packs(
        &self,
        hashes: &[String],
        season: u32,
        episode: u32,
        ctx: &DriverContext,
    ) -> Result<HashMap<String, Option<PackHint>>, DebridError>;
}

/// A debrid service driver.
///
/// Optional capabilities are advertised through `as_*` accessors returning a
/// usable trait object when supported, so the engine can branch on capability
/// without downcasting.
#[async_trait]
pub trait DebridService: Send + Sync {
    /// Stable label used for logging and cache scoping.
    fn identifier(&self) -> &'static str;

    /// Return the subset of `hashes` the service reports as already cached.
    ///
    /// Must be idempotent. Partial vendor errors degrade to an empty set;
    /// only terminal faults (auth) are returned as errors.
    async fn batch_check_hashes(
        &self,
        hashes: &HashSet<String>,
        ctx: &DriverContext,
    ) -> Result<HashSet<String>, DebridError>;

    fn as_live_checker(&self) -> Option<&dyn LiveCacheCheck> {
        None
    }

    fn as_pack_inspector(&self) -> Option<&dyn SeasonPackInspect> {
        None
    }

    /// Invoked exactly once at end-of-request, success or failure. Drivers
    /// release vendor-side resources here; errors must be swallowed inside.
    async fn cleanup(&self) {}
}
