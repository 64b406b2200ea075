//! Pass-through filter stages: seen-item exclusion and minimum popularity.

use crate::link;
use crate::stage::StageReport;
use movierec_core::{RecommendationCandidate, UserProfile};
use movierec_personalization::PreferenceIndex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const SEEN_STAGE: &str = "seen-filter";
pub const POPULARITY_STAGE: &str = "popularity-filter";

type CandidateRx = mpsc::Receiver<RecommendationCandidate>;

/// The target has not rated the item either way.
pub fn is_unseen(target: &UserProfile, candidate: &RecommendationCandidate) -> bool {
    !target.has_rated(candidate.item_id)
}

pub fn meets_min_support(
    index: &PreferenceIndex,
    candidate: &RecommendationCandidate,
    min_support: usize,
) -> bool {
    index.like_count(candidate.item_id) >= min_support
}

/// Spawn a stage that forwards candidates for which `keep` holds.
pub fn spawn_filter<F>(
    stage: &'static str,
    mut input: CandidateRx,
    token: CancellationToken,
    keep: F,
) -> (CandidateRx, JoinHandle<StageReport>)
where
    F: Fn(&RecommendationCandidate) -> bool + Send + 'static,
{
    let (tx, rx) = link::link();

    let handle = tokio::spawn(async move {
        let mut report = StageReport::new(stage);
        loop {
            let candidate = match link::recv(&mut input, &token).await {
                Ok(candidate) => candidate,
                Err(halt) => {
                    report.halt(halt);
                    break;
                }
            };
            report.received += 1;
            if !keep(&candidate) {
                continue;
            }
            if let Err(halt) = link::send(&tx, candidate, &token).await {
                report.halt(halt);
                break;
            }
            report.emitted += 1;
        }
        metrics::counter!("pipeline.candidates_filtered", "stage" => stage)
            .increment((report.received - report.emitted) as u64);
        report.finish()
    });

    (rx, handle)
}

pub fn spawn_seen_filter(
    input: CandidateRx,
    target: Arc<UserProfile>,
    token: CancellationToken,
) -> (CandidateRx, JoinHandle<StageReport>) {
    spawn_filter(SEEN_STAGE, input, token, move |c| is_unseen(&target, c))
}

pub fn spawn_popularity_filter(
    input: CandidateRx,
    index: Arc<PreferenceIndex>,
    min_support: usize,
    token: CancellationToken,
) -> (CandidateRx, JoinHandle<StageReport>) {
    spawn_filter(POPULARITY_STAGE, input, token, move |c| {
        meets_min_support(&index, c, min_support)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(items: Vec<i64>) -> CandidateRx {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for id in items {
            tx.try_send(RecommendationCandidate::new(1, id, format!("Item {id}")))
                .unwrap();
        }
        rx
    }

    async fn drain(mut rx: CandidateRx) -> Vec<i64> {
        let mut ids = Vec::new();
        while let Some(c) = rx.recv().await {
            ids.push(c.item_id);
        }
        ids
    }

    fn profile(id: i64, liked: &[i64], not_liked: &[i64]) -> UserProfile {
        UserProfile {
            user_id: id,
            liked: liked.iter().copied().collect(),
            not_liked: not_liked.iter().copied().collect(),
        }
    }

    #[tokio::test]
    async fn test_seen_filter_drops_rated_items() {
        let target = Arc::new(profile(1, &[2], &[4]));
        let (rx, handle) =
            spawn_seen_filter(feed(vec![1, 2, 3, 4, 5]), target, CancellationToken::new());

        assert_eq!(drain(rx).await, vec![1, 3, 5]);
        let report = handle.await.unwrap();
        assert_eq!(report.stage, SEEN_STAGE);
        assert_eq!(report.received, 5);
        assert_eq!(report.emitted, 3);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_late_cancel_does_not_mark_finished_stage() {
        let token = CancellationToken::new();
        let (rx, handle) = spawn_filter("noop", feed(vec![1, 2]), token.clone(), |_| true);
        assert_eq!(drain(rx).await, vec![1, 2]);

        // The output is closed, so the stage has already left its loop.
        token.cancel();
        let report = handle.await.unwrap();
        assert!(!report.cancelled);
        assert_eq!(report.emitted, 2);
    }

    #[tokio::test]
    async fn test_popularity_filter_applies_threshold() {
        let index = Arc::new(PreferenceIndex::build(vec![
            profile(1, &[10, 20], &[]),
            profile(2, &[10], &[30]),
            profile(3, &[10, 20], &[]),
        ]));
        // likes: 10 -> 3, 20 -> 2, 30 -> 0
        let (rx, _) = spawn_popularity_filter(
            feed(vec![10, 20, 30]),
            index,
            2,
            CancellationToken::new(),
        );
        assert_eq!(drain(rx).await, vec![10, 20]);
    }

    #[tokio::test]
    async fn test_zero_min_support_keeps_unliked_items() {
        let index = Arc::new(PreferenceIndex::default());
        let (rx, _) =
            spawn_popularity_filter(feed(vec![7, 8]), index, 0, CancellationToken::new());
        assert_eq!(drain(rx).await, vec![7, 8]);
    }

    #[tokio::test]
    async fn test_cancelled_filter_closes_output() {
        let token = CancellationToken::new();
        token.cancel();
        let (rx, handle) = spawn_filter("noop", feed(vec![1, 2, 3]), token, |_| true);

        assert!(drain(rx).await.is_empty());
        let report = handle.await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.emitted, 0);
    }
}
