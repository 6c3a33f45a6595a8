//! The aggregation core.
//!
//! This crate coordinates many concurrent upstream calls for one stream
//! request: indexer scrapers fan out under a shared cancellation scope,
//! identical searches are deduplicated process-wide, and the cache-admission
//! engine walks quality tiers to decide which cached candidates are worth
//! returning. The shared HTTP client bounds sockets per upstream, recycles
//! aging transports and adapts proxy routing on persistent error streaks.

pub mod admission;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fanout;
pub mod http;

pub use admission::AdmissionEngine;
pub use config::{
    AdmissionPolicy, CoordinatorConfig, FanoutPolicy, HttpSettings, QuotaPlan, QuotaPlanBuilder,
};
pub use coordinator::{CoordinationKey, SearchCoordinator, ShareKey};
pub use error::EngineError;
pub use fanout::run_fanout;
pub use http::{Outcome, ProxyConfig, SharedHttp};
