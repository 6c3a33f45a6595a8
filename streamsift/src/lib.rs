//! streamsift — a streaming-metadata aggregator.
//!
//! Given a movie or episode id, streamsift fans searches out across indexer
//! scrapers, confirms which discovered releases a debrid service already has
//! cached, applies a tiered quality-quota admission policy, and returns a
//! ranked list of playable stream candidates merged with the user's own
//! media.

pub mod aggregator;
pub mod config;
pub mod database;
pub mod error;
pub mod home_library;
pub mod logging;
pub mod metadata;

pub use config::AppConfig;
pub use error::{Error, Result};
