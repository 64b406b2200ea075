//! Concurrent recommendation pipeline — candidate generation, seen and
//! popularity filters, fan-out scoring workers, and top-N aggregation,
//! connected by single-slot channels and a shared cancellation token.

pub mod aggregator;
pub mod filters;
pub mod generator;
pub mod link;
pub mod pipeline;
pub mod scoring;
pub mod stage;

pub use pipeline::{RecommendationOutcome, RecommendationPipeline, Recommendations};
pub use scoring::ScoringWorker;
pub use stage::StageReport;
pub use tokio_util::sync::CancellationToken;
