//! Suggestion ordering

use std::cmp::Ordering;

use crate::models::fix::FixSuggestion;

/// Confidence only breaks priority ties when the gap exceeds this
pub const CONFIDENCE_MARGIN: f64 = 0.1;

/// Pairwise order: priority desc, confidence desc beyond the margin, impact desc
pub fn compare(a: &FixSuggestion, b: &FixSuggestion) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| {
            let gap = b.confidence - a.confidence;
            if gap.abs() > CONFIDENCE_MARGIN {
                gap.partial_cmp(&0.0).unwrap_or(Ordering::Equal)
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| b.impact.cmp(&a.impact))
}

/// Stable insertion sort. The confidence margin makes [`compare`] non-transitive,
/// so a library sort is not used here.
pub fn rank(fixes: &mut [FixSuggestion]) {
    for i in 1..fixes.len() {
        let mut j = i;
        while j > 0 && compare(&fixes[j - 1], &fixes[j]) == Ordering::Greater {
            fixes.swap(j - 1, j);
            j -= 1;
        }
    }
}
