//! Pipeline orchestration — wires the stages for one target user, drains the
//! result, and waits for every stage before returning.

use crate::aggregator;
use crate::filters::{spawn_popularity_filter, spawn_seen_filter};
use crate::generator::spawn_generator;
use crate::scoring::spawn_fanout;
use crate::stage::{StageReport, StageSet};
use chrono::{DateTime, Utc};
use movierec_core::config::PipelineConfig;
use movierec_core::{RecError, RecResult, RecommendationCandidate, UserId};
use movierec_personalization::{Catalog, PreferenceIndex};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Ranked recommendations from one run.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    pub run_id: Uuid,
    pub user_id: UserId,
    pub items: Vec<RecommendationCandidate>,
    /// Candidates that reached the aggregator before truncation.
    pub scored: usize,
    pub cancelled: bool,
    pub stages: Vec<StageReport>,
    pub generated_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendationOutcome {
    /// The target has no rating history. Not an error.
    UserNotFound { user_id: UserId },
    Ranked(Recommendations),
}

impl RecommendationOutcome {
    pub fn recommendations(&self) -> Option<&Recommendations> {
        match self {
            Self::Ranked(recs) => Some(recs),
            Self::UserNotFound { .. } => None,
        }
    }
}

/// Collaborative-filtering pipeline over a fixed index and catalog.
pub struct RecommendationPipeline {
    index: Arc<PreferenceIndex>,
    catalog: Arc<Catalog>,
    config: PipelineConfig,
}

impl RecommendationPipeline {
    pub fn new(index: Arc<PreferenceIndex>, catalog: Arc<Catalog>, config: PipelineConfig) -> Self {
        Self {
            index,
            catalog,
            config,
        }
    }

    /// Run with the configured deadline, if any.
    pub async fn run(
        &self,
        user_id: UserId,
        token: &CancellationToken,
    ) -> RecResult<RecommendationOutcome> {
        match self.config.timeout_ms {
            Some(ms) => {
                self.recommend_with_timeout(user_id, Duration::from_millis(ms), token)
                    .await
            }
            None => self.recommend(user_id, token).await,
        }
    }

    /// Like [`recommend`](Self::recommend), but cancels the run once `timeout`
    /// has elapsed. Cancelling `token` still stops the run early.
    pub async fn recommend_with_timeout(
        &self,
        user_id: UserId,
        timeout: Duration,
        token: &CancellationToken,
    ) -> RecResult<RecommendationOutcome> {
        let run_token = token.child_token();
        let timer_token = run_token.clone();
        let timer = tokio::spawn(async move {
            tokio::select! {
                _ = timer_token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    warn!(timeout_ms = timeout.as_millis() as u64, "Pipeline deadline reached, cancelling");
                    timer_token.cancel();
                }
            }
        });

        let result = self.recommend(user_id, &run_token).await;

        // Releases the timer; the child token does not reach the caller's.
        run_token.cancel();
        let _ = timer.await;
        result
    }

    /// Recommend unseen items for `user_id`.
    ///
    /// Every stage observes `token`. On cancellation the stages close their
    /// outputs, the aggregator ranks whatever reached it, and the result is
    /// flagged `cancelled`. The call returns only after every stage task has
    /// terminated.
    pub async fn recommend(
        &self,
        user_id: UserId,
        token: &CancellationToken,
    ) -> RecResult<RecommendationOutcome> {
        let Some(profile) = self.index.profile(user_id) else {
            info!(user_id, "Target user not found in ratings data");
            return Ok(RecommendationOutcome::UserNotFound { user_id });
        };
        if self.config.scoring_concurrency == 0 {
            return Err(RecError::Config(
                "scoring_concurrency must be at least 1".to_string(),
            ));
        }

        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let target = Arc::new(profile.clone());
        info!(
            run_id = %run_id,
            user_id,
            catalog_items = self.catalog.len(),
            min_support = self.config.min_support,
            workers = self.config.scoring_concurrency,
            "Pipeline started"
        );
        metrics::counter!("pipeline.runs").increment(1);

        let mut stages = StageSet::new();
        let (generated, handle) = spawn_generator(user_id, self.catalog.clone(), token.clone());
        stages.push(handle);
        let (unseen, handle) = spawn_seen_filter(generated, target.clone(), token.clone());
        stages.push(handle);
        let (popular, handle) = spawn_popularity_filter(
            unseen,
            self.index.clone(),
            self.config.min_support,
            token.clone(),
        );
        stages.push(handle);
        let (merged, fan_in) = spawn_fanout(
            popular,
            self.config.scoring_concurrency,
            target,
            self.index.clone(),
            token.clone(),
        );

        let results = aggregator::collect(merged).await;
        let scored = results.len();
        let items = aggregator::top_n(results, self.config.top_n);

        // Upstream stages must be confirmed finished before the run is done.
        let upstream = stages.join_all().await;
        let scoring = fan_in
            .await
            .map_err(|e| RecError::Stage(e.to_string()))
            .and_then(|r| r);
        let mut reports = upstream?;
        reports.extend(scoring?);

        let cancelled = reports.iter().any(|r| r.cancelled);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if cancelled {
            metrics::counter!("pipeline.cancelled").increment(1);
            warn!(run_id = %run_id, scored, returned = items.len(), "Pipeline cancelled");
        } else {
            info!(
                run_id = %run_id,
                scored,
                returned = items.len(),
                elapsed_ms,
                "Pipeline finished"
            );
        }

        Ok(RecommendationOutcome::Ranked(Recommendations {
            run_id,
            user_id,
            items,
            scored,
            cancelled,
            stages: reports,
            generated_at: Utc::now(),
            elapsed_ms,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::score_candidate;
    use movierec_core::UserProfile;

    fn profile(id: i64, liked: &[i64], not_liked: &[i64]) -> UserProfile {
        UserProfile {
            user_id: id,
            liked: liked.iter().copied().collect(),
            not_liked: not_liked.iter().copied().collect(),
        }
    }

    fn config(min_support: usize, top_n: usize) -> PipelineConfig {
        PipelineConfig {
            min_support,
            top_n,
            ..Default::default()
        }
    }

    fn large_pipeline(items: i64) -> RecommendationPipeline {
        let mut profiles = vec![profile(1, &[0], &[])];
        for uid in 2..50 {
            let liked: Vec<i64> = (0..items).filter(|i| i % uid == 0).collect();
            profiles.push(profile(uid, &liked, &[]));
        }
        let catalog: Catalog = (0..items).map(|id| (id, format!("Item {id}"))).collect();
        RecommendationPipeline::new(
            Arc::new(PreferenceIndex::build(profiles)),
            Arc::new(catalog),
            config(0, 20),
        )
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_an_error() {
        let pipeline = RecommendationPipeline::new(
            Arc::new(PreferenceIndex::default()),
            Arc::new(Catalog::new()),
            PipelineConfig::default(),
        );
        let outcome = pipeline
            .recommend(42, &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            RecommendationOutcome::UserNotFound { user_id: 42 }
        ));
        assert!(outcome.recommendations().is_none());
    }

    #[tokio::test]
    async fn test_zero_workers_rejected() {
        let index = PreferenceIndex::build(vec![profile(1, &[1], &[])]);
        let pipeline = RecommendationPipeline::new(
            Arc::new(index),
            Arc::new(Catalog::new()),
            PipelineConfig {
                scoring_concurrency: 0,
                ..Default::default()
            },
        );
        let err = pipeline
            .recommend(1, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RecError::Config(_)));
    }

    #[tokio::test]
    async fn test_full_run_reports_every_stage() {
        let pipeline = large_pipeline(500);
        let outcome = pipeline
            .recommend(1, &CancellationToken::new())
            .await
            .unwrap();
        let recs = outcome.recommendations().unwrap();

        assert!(!recs.cancelled);
        // item 0 is seen; every other item passes with min_support 0
        assert_eq!(recs.scored, 499);
        assert_eq!(recs.items.len(), 20);
        assert!(recs.items.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(recs.items.iter().all(|c| c.item_id != 0));

        // generator, two filters, two scorers, fan-in
        assert_eq!(recs.stages.len(), 6);
        assert_eq!(recs.stages[0].emitted, 500);
        assert_eq!(recs.stages.last().unwrap().received, 499);
    }

    #[tokio::test]
    async fn test_precancelled_run_terminates_empty() {
        let pipeline = large_pipeline(500);
        let token = CancellationToken::new();
        token.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(5), pipeline.recommend(1, &token))
            .await
            .expect("pipeline hung after cancellation")
            .unwrap();
        let recs = outcome.recommendations().unwrap();
        assert!(recs.cancelled);
        assert!(recs.items.is_empty());
        assert!(recs.stages.iter().all(|s| s.cancelled));
    }

    #[tokio::test]
    async fn test_cancel_mid_run_terminates_all_stages() {
        let pipeline = Arc::new(large_pipeline(50_000));
        let token = CancellationToken::new();

        let run = {
            let pipeline = pipeline.clone();
            let token = token.clone();
            tokio::spawn(async move { pipeline.recommend(1, &token).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        token.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("pipeline hung after cancellation")
            .unwrap()
            .unwrap();
        let recs = outcome.recommendations().unwrap();
        assert!(recs.cancelled);
        assert!(recs.scored < 49_999);
        assert!(recs.stages.iter().all(|s| s.cancelled));

        // Everything the aggregator saw was fully scored.
        let target = pipeline.index.profile(1).unwrap();
        for item in &recs.items {
            let expected = score_candidate(
                RecommendationCandidate::new(1, item.item_id, item.title.clone()),
                target,
                &pipeline.index,
            );
            assert_eq!(item.score, expected.score, "item {}", item.item_id);
            assert_eq!(item.support_count, expected.support_count);
        }
    }

    #[tokio::test]
    async fn test_timeout_cancels_run() {
        let pipeline = large_pipeline(50_000);
        let caller = CancellationToken::new();

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            pipeline.recommend_with_timeout(1, Duration::from_millis(1), &caller),
        )
        .await
        .expect("pipeline hung after deadline")
        .unwrap();

        assert!(outcome.recommendations().unwrap().cancelled);
        // The deadline cancels a child token, never the caller's.
        assert!(!caller.is_cancelled());
    }

    #[tokio::test]
    async fn test_generous_timeout_completes() {
        let pipeline = large_pipeline(100);
        let outcome = pipeline
            .recommend_with_timeout(1, Duration::from_secs(30), &CancellationToken::new())
            .await
            .unwrap();
        let recs = outcome.recommendations().unwrap();
        assert!(!recs.cancelled);
        assert_eq!(recs.scored, 99);
    }
}
