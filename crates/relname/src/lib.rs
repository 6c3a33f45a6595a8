//! Release-name analysis.
//!
//! Everything in this crate is a pure function of the release name string:
//! normalization, the memoized metadata parser, episode/season-pack markers,
//! and the series/movie relevance filters that feed the admission engine.

pub mod episode;
pub mod filter;
pub mod normalize;
pub mod parser;

pub use episode::{
    has_episode_marker, is_relevant_multi_season_pack, is_season_pack, matches_other_episode,
};
pub use filter::{matches_movie_title, matches_series_title};
pub use normalize::{normalize_title, significant_words};
pub use parser::{MemoizedParser, ParsedRelease, parse_release_name};
