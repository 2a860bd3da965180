use std::cmp::Ordering;

use serde::Serialize;

use super::CutCandidate;

/// Why a candidate was not selected.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    BelowConfidence,
    /// An accepted candidate at `claimed_by` was closer than the minimum gap.
    TooClose { claimed_by: f64 },
}

/// Result of greedy selection over a set of candidates.
#[derive(Clone, Debug, Default)]
pub struct Selection {
    /// Accepted candidates, chronological.
    pub selected: Vec<CutCandidate>,
    /// Everything else, with the reason it was skipped. Ordered by rank.
    pub skipped: Vec<(CutCandidate, SkipReason)>,
}

// Confidence descending, then time ascending.
fn by_rank(a: &CutCandidate, b: &CutCandidate) -> Ordering {
    b.confidence_score()
        .cmp(&a.confidence_score())
        .then_with(|| a.time().total_cmp(&b.time()))
}

/// Greedily accepts candidates from the most to the least confident.
///
/// A candidate is accepted if it reaches `min_confidence` and lies at least `min_gap` seconds
/// from every candidate accepted before it, so strong cuts claim their neighbourhood first. A
/// non-positive `min_gap` simply disables the gap filter.
pub fn select_candidates(
    candidates: &[CutCandidate],
    min_confidence: u32,
    min_gap: f64,
) -> Selection {
    let mut ranked = candidates.to_vec();
    ranked.sort_by(by_rank);

    let mut selection = Selection::default();

    for candidate in ranked {
        if candidate.confidence_score() < min_confidence {
            selection
                .skipped
                .push((candidate, SkipReason::BelowConfidence));
            continue;
        }

        let claimed_by = selection
            .selected
            .iter()
            .find(|existing| (candidate.time() - existing.time()).abs() < min_gap);

        match claimed_by {
            Some(existing) => {
                let reason = SkipReason::TooClose {
                    claimed_by: existing.time(),
                };
                selection.skipped.push((candidate, reason));
            }
            None => selection.selected.push(candidate),
        }
    }

    selection
        .selected
        .sort_by(|a, b| a.time().total_cmp(&b.time()));

    tracing::debug!(
        selected = selection.selected.len(),
        skipped = selection.skipped.len(),
        "finished greedy selection"
    );

    selection
}
