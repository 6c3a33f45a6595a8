//! Indexer scraper contract.
//!
//! A scraper turns one query into a list of release candidates. Drivers must
//! honor cancellation promptly and never let errors escape the fanout: the
//! fanout logs and degrades them to empty result lists.

pub mod jackett;
pub mod scraper;

pub use jackett::JackettScraper;
pub use scraper::{ScrapeContext, ScrapeError, ScrapeQuery, Scraper};
