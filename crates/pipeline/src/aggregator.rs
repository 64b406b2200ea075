//! Result aggregation — drain the merged scorer output and keep the best N.

use movierec_core::RecommendationCandidate;
use std::cmp::Ordering;
use tokio::sync::mpsc;

/// Drain `input` until every producer has dropped its sender.
pub async fn collect(
    mut input: mpsc::Receiver<RecommendationCandidate>,
) -> Vec<RecommendationCandidate> {
    let mut results = Vec::new();
    while let Some(candidate) = input.recv().await {
        results.push(candidate);
    }
    results
}

/// Score descending; equal scores fall back to ascending item id.
pub fn by_rank(a: &RecommendationCandidate, b: &RecommendationCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.item_id.cmp(&b.item_id))
}

pub fn top_n(
    mut candidates: Vec<RecommendationCandidate>,
    n: usize,
) -> Vec<RecommendationCandidate> {
    candidates.sort_unstable_by(by_rank);
    candidates.truncate(n);
    candidates
}
