//! Series and movie relevance filters.

use crate::normalize::{normalize_title, significant_words};
use crate::parser::ParsedRelease;

/// Franchise sibling aliases. A candidate that carries one of the aliases but
/// whose canonical title does not is a different show in the same franchise
/// and must be rejected, however well the shared words overlap.
const FRANCHISE_SIBLINGS: &[(&str, &[&str])] = &[
    (
        "star trek",
        &[
            "discovery",
            "picard",
            "strange new worlds",
            "lower decks",
            "prodigy",
            "voyager",
            "deep space nine",
            "enterprise",
            "the next generation",
        ],
    ),
    (
        "star wars",
        &[
            "the clone wars",
            "rebels",
            "resistance",
            "the bad batch",
            "andor",
            "ahsoka",
            "the mandalorian",
        ],
    ),
    ("ncis", &["los angeles", "new orleans", "hawaii", "sydney"]),
    ("csi", &["miami", "new york", "vegas", "cyber"]),
    ("law and order", &["special victims unit", "criminal intent", "organized crime"]),
    ("the walking dead", &["fear", "world beyond", "dead city", "daryl dixon"]),
];

/// Reject candidates that name a franchise sibling the canonical title does
/// not name itself.
fn franchise_mismatch(normalized_candidate: &str, normalized_canonical: &str) -> bool {
    for (franchise, siblings) in FRANCHISE_SIBLINGS {
        if !normalized_candidate.contains(franchise) {
            continue;
        }
        for sibling in *siblings {
            if normalized_candidate.contains(sibling) && !normalized_canonical.contains(sibling) {
                return true;
            }
        }
    }
    false
}

/// Series title check: exact normalized match, or every significant canonical
/// word present in the normalized raw name. Franchise siblings never pass.
pub fn matches_series_title(
    parsed: &ParsedRelease,
    raw_name: &str,
    canonical_title: &str,
) -> bool {
    let canonical = normalize_title(canonical_title);
    if canonical.is_empty() {
        return false;
    }
    let raw = normalize_title(raw_name);

    if franchise_mismatch(&raw, &canonical) {
        return false;
    }

    if let Some(title) = &parsed.title
        && title == &canonical
    {
        return true;
    }

    significant_words(&canonical)
        .iter()
        .all(|word| raw.split(' ').any(|w| w == *word))
}

/// Movie title check: series-like names are dropped, the parsed year must
/// match the canonical year exactly when one is known, and enough of the
/// canonical title's words must appear in the name (at least half of the
/// significant words, or every word for one/two-word titles).
pub fn matches_movie_title(
    parsed: &ParsedRelease,
    raw_name: &str,
    canonical_title: &str,
    canonical_year: Option<u32>,
) -> bool {
    if parsed.looks_like_series() {
        return false;
    }

    if let Some(canonical_year) = canonical_year {
        match parsed.year {
            Some(year) if year == canonical_year => {}
            _ => return false,
        }
    }

    let canonical = normalize_title(canonical_title);
    if canonical.is_empty() {
        return false;
    }
    let raw = normalize_title(raw_name);

    let words = significant_words(&canonical);
    let present = words
        .iter()
        .filter(|word| raw.split(' ').any(|w| w == **word))
        .count();

    if words.len() <= 2 {
        present == words.len()
    } else {
        present * 2 >= words.len()
    }
}
