//! Fan-out scoring — a pool of workers competing for one input link, each
//! attaching an average-similarity score, merged back into one output.

use crate::link::{self, Halt};
use crate::stage::{StageReport, StageSet};
use movierec_core::{RecResult, RecommendationCandidate, UserProfile};
use movierec_personalization::{similarity, PreferenceIndex};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub const FAN_IN_STAGE: &str = "fan-in";

/// Input link shared by every worker. Each candidate is taken by exactly one.
pub type SharedInput = Arc<Mutex<mpsc::Receiver<RecommendationCandidate>>>;

/// Score a candidate as the mean similarity between the target and the users
/// who liked the item.
///
/// The target's own like and likers without a profile count towards
/// `support_count` but add nothing to the similarity sum.
pub fn score_candidate(
    mut candidate: RecommendationCandidate,
    target: &UserProfile,
    index: &PreferenceIndex,
) -> RecommendationCandidate {
    let likers = index.likers(candidate.item_id);
    if likers.is_empty() {
        candidate.score = 0.0;
        candidate.support_count = 0;
        return candidate;
    }

    let total: f64 = likers
        .iter()
        .filter(|uid| **uid != target.user_id)
        .filter_map(|uid| index.profile(*uid))
        .map(|other| similarity(target, other))
        .sum();

    candidate.support_count = likers.len();
    candidate.score = total / likers.len() as f64;
    candidate
}

/// A single scoring worker.
pub struct ScoringWorker {
    pub worker_id: usize,
    target: Arc<UserProfile>,
    index: Arc<PreferenceIndex>,
}

impl ScoringWorker {
    pub fn new(worker_id: usize, target: Arc<UserProfile>, index: Arc<PreferenceIndex>) -> Self {
        Self {
            worker_id,
            target,
            index,
        }
    }

    pub fn stage_name(&self) -> String {
        format!("scorer-{:02}", self.worker_id)
    }

    /// Spawn this worker as a Tokio task pulling from the shared input.
    pub fn spawn(
        self,
        input: SharedInput,
        output: mpsc::Sender<RecommendationCandidate>,
        token: CancellationToken,
    ) -> JoinHandle<StageReport> {
        tokio::spawn(async move { self.run(input, output, token).await })
    }

    async fn run(
        self,
        input: SharedInput,
        output: mpsc::Sender<RecommendationCandidate>,
        token: CancellationToken,
    ) -> StageReport {
        let mut report = StageReport::new(self.stage_name());
        debug!(worker = self.worker_id, "Scoring worker started");

        loop {
            let next = {
                let mut rx = tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        report.halt(Halt::Cancelled);
                        break;
                    }
                    rx = input.lock() => rx,
                };
                link::recv(&mut rx, &token).await
            };
            let candidate = match next {
                Ok(candidate) => candidate,
                Err(halt) => {
                    report.halt(halt);
                    break;
                }
            };
            report.received += 1;

            let scored = score_candidate(candidate, &self.target, &self.index);
            if let Err(halt) = link::send(&output, scored, &token).await {
                report.halt(halt);
                break;
            }
            report.emitted += 1;
        }

        metrics::counter!("pipeline.candidates_scored").increment(report.emitted as u64);
        report.finish()
    }
}

/// Spawn `workers` scorers over `input` plus the fan-in join task.
///
/// The merged output closes only after the join task has seen every worker
/// terminate. The join task yields the workers' reports followed by its own.
pub fn spawn_fanout(
    input: mpsc::Receiver<RecommendationCandidate>,
    workers: usize,
    target: Arc<UserProfile>,
    index: Arc<PreferenceIndex>,
    token: CancellationToken,
) -> (
    mpsc::Receiver<RecommendationCandidate>,
    JoinHandle<RecResult<Vec<StageReport>>>,
) {
    let input: SharedInput = Arc::new(Mutex::new(input));
    let (tx, rx) = link::link();

    let mut pool = StageSet::new();
    for worker_id in 0..workers {
        let worker = ScoringWorker::new(worker_id, target.clone(), index.clone());
        pool.push(worker.spawn(input.clone(), tx.clone(), token.clone()));
    }
    debug!(workers, "Scoring fan-out started");

    let join = tokio::spawn(async move {
        let result = pool.join_all().await;
        // Last sender; dropping it closes the merged output.
        drop(tx);

        let mut reports = match result {
            Ok(reports) => reports,
            Err(e) => {
                error!(error = %e, "Scoring worker failed");
                return Err(e);
            }
        };
        let mut fan_in = StageReport::new(FAN_IN_STAGE);
        fan_in.received = reports.iter().map(|r| r.emitted).sum();
        fan_in.emitted = fan_in.received;
        fan_in.cancelled = reports.iter().any(|r| r.cancelled);
        reports.push(fan_in.finish());
        Ok(reports)
    });

    (rx, join)
}
