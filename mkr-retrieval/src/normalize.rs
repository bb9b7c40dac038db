//! Score normalization applied before results are fused or returned.
//!
//! Every backend uses the same max-to-one scheme so that normalized lists from
//! different retrievers are comparable inside hybrid fusion: each score is
//! divided by the list maximum and negative scores are floored at zero. A list
//! whose maximum is not positive normalizes to all zeros.

use crate::document::RetrievalResult;

/// Normalize raw scores in place to the `[0, 1]` range with max equal to 1.
///
/// Empty input is left unchanged. If no score is positive, every score
/// becomes `0.0`.
pub fn normalize_scores(scores: &mut [f32]) {
    let max = scores.iter().copied().filter(|s| s.is_finite()).fold(f32::NEG_INFINITY, f32::max);
    if max <= 0.0 {
        scores.iter_mut().for_each(|s| *s = 0.0);
        return;
    }
    for score in scores.iter_mut() {
        *score = if score.is_finite() { (*score / max).clamp(0.0, 1.0) } else { 0.0 };
    }
}

/// Normalize the scores of a result list in place. Order is untouched.
pub fn normalize_results(results: &mut [RetrievalResult]) {
    let mut scores: Vec<f32> = results.iter().map(|r| r.score).collect();
    normalize_scores(&mut scores);
    for (result, score) in results.iter_mut().zip(scores) {
        result.score = score;
    }
}
