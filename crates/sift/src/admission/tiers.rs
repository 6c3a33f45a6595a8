//! The ordered quality tiers the engine walks.

use release_types::{Category, Resolution};

/// One `(categories × resolutions)` slice of the walk.
#[derive(Debug)]
pub(crate) struct Tier {
    pub name: &'static str,
    pub categories: &'static [Category],
    pub resolutions: &'static [Resolution],
}

// Candidates whose name carries no resolution token ride at the tail of their
// category's primary tier rather than being dropped on the floor.
const HIGH_RES: &[Resolution] = &[Resolution::R2160p, Resolution::R1080p, Resolution::Unknown];

const GOLDEN_CATEGORIES: &[Category] = &[Category::Remux, Category::BluRay, Category::Web];
const RIP_CATEGORIES: &[Category] = &[Category::WebRip];
const LAST_CATEGORIES: &[Category] = &[Category::AudioFocused, Category::Other];

pub(crate) const HIGH_TIERS: &[Tier] = &[
    Tier {
        name: "golden",
        categories: GOLDEN_CATEGORIES,
        resolutions: HIGH_RES,
    },
    Tier {
        name: "compromise-hires",
        categories: RIP_CATEGORIES,
        resolutions: HIGH_RES,
    },
    Tier {
        name: "lastresort-hires",
        categories: LAST_CATEGORIES,
        resolutions: HIGH_RES,
    },
];

pub(crate) const LOW_TIERS: &[Tier] = &[
    Tier {
        name: "fallback-lowres",
        categories: GOLDEN_CATEGORIES,
        resolutions: &[Resolution::R720p],
    },
    Tier {
        name: "compromise-lowres",
        categories: RIP_CATEGORIES,
        resolutions: &[Resolution::R720p],
    },
    Tier {
        name: "lastresort-lowres",
        categories: LAST_CATEGORIES,
        resolutions: &[Resolution::R720p, Resolution::R480p],
    },
];
