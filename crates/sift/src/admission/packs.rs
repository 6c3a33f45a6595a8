//! Season-pack collection and batched inspection rounds.

use crate::admission::classify::Classified;
use crate::config::AdmissionPolicy;
use debrid::{DebridError, DriverContext, SeasonPackInspect};
use release_types::{EpisodeTarget, PackHint};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Packs worth inspecting for the target episode: single-season packs of the
/// target season and multi-season packs covering it, minus anything that
/// names a different episode. Deduplicated by hash, ordered best-first by
/// quality, then resolution, then size.
pub(crate) fn collect_packs(
    classified: &[Classified],
    target: EpisodeTarget,
) -> Vec<Classified> {
    let mut seen = HashSet::new();
    let mut packs: Vec<Classified> = Vec::new();
    for entry in classified {
        let name = entry.name();
        if relname::matches_other_episode(name, target.season, target.episode) {
            continue;
        }
        if !relname::is_season_pack(name, target.season)
            && !relname::is_relevant_multi_season_pack(name, target.season)
        {
            continue;
        }
        if seen.insert(entry.hash().to_string()) {
            packs.push(entry.clone());
        }
    }

    packs.sort_by(|a, b| {
        b.category
            .quality_score()
            .cmp(&a.category.quality_score())
            .then(b.resolution.score().cmp(&a.resolution.score()))
            .then(b.size().cmp(&a.size()))
    });
    packs
}

/// Drive up to `max_pack_rounds` inspection batches of `max_packs_to_inspect`
/// packs each, accumulating confirmed hints until enough packs are confirmed
/// or the rounds are exhausted.
pub(crate) async fn run_inspection_rounds(
    inspector: &dyn SeasonPackInspect,
    packs: &[Classified],
    target: EpisodeTarget,
    policy: &AdmissionPolicy,
    ctx: &DriverContext,
) -> Result<HashMap<String, PackHint>, DebridError> {
    let mut confirmed: HashMap<String, PackHint> = HashMap::new();
    let batch_size = policy.max_packs_to_inspect.max(1);

    for round in 0..policy.max_pack_rounds {
        if ctx.cancel.is_cancelled() {
            break;
        }
        if confirmed.len() >= policy.max_packs_to_inspect {
            break;
        }

        let batch: Vec<String> = packs
            .iter()
            .skip(round * batch_size)
            .take(batch_size)
            .map(|p| p.hash().to_string())
            .collect();
        if batch.is_empty() {
            break;
        }

        debug!(
            tag = %ctx.tag,
            round,
            batch = batch.len(),
            "inspecting season packs"
        );

        let hints = match inspector
            .batch_inspect_season_packs(&batch, target.season, target.episode, ctx)
            .await
        {
            Ok(hints) => hints,
            Err(err) if err.is_terminal_for_service() => return Err(err),
            Err(err) => {
                warn!(tag = %ctx.tag, error = %err, "pack inspection failed, stopping rounds");
                break;
            }
        };

        for (hash, hint) in hints {
            if let Some(hint) = hint {
                confirmed.insert(hash, hint);
            }
        }
    }

    Ok(confirmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::classify::normalize_and_classify;
    use crate::config::AdmissionPolicy;
    use relname::MemoizedParser;
    use release_types::ReleaseCandidate;

    fn classified(titles: &[(&str, &str, u64)]) -> Vec<Classified> {
        let parser = MemoizedParser::default();
        let candidates = titles
            .iter()
            .map(|(hash, title, size)| {
                let mut candidate = ReleaseCandidate::new(hash.repeat(40), *title);
                candidate.size = *size;
                candidate
            })
            .collect();
        normalize_and_classify(candidates, &parser, &AdmissionPolicy::default())
    }

    #[test]
    fn collects_and_orders_packs_best_first() {
        let classified = classified(&[
            ("a", "Show.S02.1080p.WEB-DL", 10),
            ("b", "Show.S02.2160p.Remux", 60),
            ("c", "Show.S02E03.1080p.WEB-DL", 8),
            ("d", "Show.S01-S03.720p.BluRay", 30),
            ("e", "Show.S03.2160p.Remux", 50),
        ]);
        let packs = collect_packs(&classified, EpisodeTarget::new(2, 5));
        let hashes: Vec<_> = packs.iter().map(|p| p.hash().chars().next().unwrap()).collect();
        // b: Remux pack of the right season; d: relevant multi-season BluRay;
        // a: WEB pack. c is a specific other episode, e the wrong season.
        assert_eq!(hashes, vec!['b', 'd', 'a']);
    }
}
