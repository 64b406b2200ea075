//! Candidate generation — one unscored candidate per catalog item.

use crate::link;
use crate::stage::StageReport;
use movierec_core::{RecommendationCandidate, UserId};
use movierec_personalization::Catalog;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const STAGE_NAME: &str = "generator";

/// Spawn the generator. Items are emitted in ascending item-id order; the
/// output closes when the catalog is exhausted or the run is cancelled.
pub fn spawn_generator(
    user_id: UserId,
    catalog: Arc<Catalog>,
    token: CancellationToken,
) -> (mpsc::Receiver<RecommendationCandidate>, JoinHandle<StageReport>) {
    let (tx, rx) = link::link();

    let handle = tokio::spawn(async move {
        let mut report = StageReport::new(STAGE_NAME);
        for (item_id, title) in catalog.iter() {
            let candidate = RecommendationCandidate::new(user_id, item_id, title);
            if let Err(halt) = link::send(&tx, candidate, &token).await {
                report.halt(halt);
                break;
            }
            report.emitted += 1;
        }
        metrics::counter!("pipeline.candidates_generated").increment(report.emitted as u64);
        report.finish()
    });

    (rx, handle)
}
