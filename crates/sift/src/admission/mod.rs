//! The cache-admission engine.
//!
//! Given filtered release candidates and a debrid driver, the engine walks
//! quality tiers in order, confirms cache membership in one batched call
//! (with a bounded live-check fallback), applies quota and codec policy, and
//! inspects season packs for episode requests. The admission order is
//! deterministic for a fixed candidate list and driver behavior.

mod classify;
mod engine;
mod packs;
mod tiers;
mod trackers;

pub use engine::AdmissionEngine;
