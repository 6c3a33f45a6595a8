//! Debrid driver contract.
//!
//! Each debrid vendor is an adapter implementing a narrow capability surface:
//! a required batch cache check plus optional single-hash live checks and
//! season-pack inspection. The admission engine is written strictly against
//! these traits and never sees vendor payloads.

pub mod home_media;
pub mod registry;
pub mod service;

pub use home_media::{HomeLibrary, HomeMediaDriver, LibraryFile};
pub use registry::Vendor;
pub use service::{
    DebridError, DebridService, DriverContext, LiveCacheCheck, SeasonPackInspect,
};
