//! Per-request admission counters.

use release_types::{Category, Codec, Resolution};
use std::collections::HashMap;

/// Counters held only for the duration of one aggregation.
#[derive(Debug, Default)]
pub(crate) struct AdmissionTrackers {
    by_category_resolution: HashMap<(Category, Resolution), u32>,
    by_resolution: HashMap<Resolution, u32>,
    by_codec_per_resolution: HashMap<(Resolution, Codec), u32>,
    by_category_total: HashMap<Category, u32>,
}

impl AdmissionTrackers {
    pub fn record(&mut self, category: Category, resolution: Resolution, codec: Codec) {
        *self
            .by_category_resolution
            .entry((category, resolution))
            .or_insert(0) += 1;
        *self.by_resolution.entry(resolution).or_insert(0) += 1;
        *self
            .by_codec_per_resolution
            .entry((resolution, codec))
            .or_insert(0) += 1;
        *self.by_category_total.entry(category).or_insert(0) += 1;
    }

    pub fn category_resolution(&self, category: Category, resolution: Resolution) -> u32 {
        self.by_category_resolution
            .get(&(category, resolution))
            .copied()
            .unwrap_or(0)
    }

    pub fn resolution(&self, resolution: Resolution) -> u32 {
        self.by_resolution.get(&resolution).copied().unwrap_or(0)
    }

    pub fn codec(&self, resolution: Resolution, codec: Codec) -> u32 {
        self.by_codec_per_resolution
            .get(&(resolution, codec))
            .copied()
            .unwrap_or(0)
    }

    pub fn category_total(&self, category: Category) -> u32 {
        self.by_category_total
            .get(&category)
            .copied()
            .unwrap_or(0)
    }
}
