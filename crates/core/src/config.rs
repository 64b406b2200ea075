use serde::Deserialize;
use tracing::debug;

use crate::error::{RecError, RecResult};

/// Root application configuration. Loaded from an optional `movierec.toml`,
/// then environment variables with the prefix `MOVIEREC__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_ratings_path")]
    pub ratings_path: String,
    #[serde(default = "default_movies_path")]
    pub movies_path: String,
    /// Ratings at or above this value count as "liked".
    #[serde(default = "default_liked_threshold")]
    pub liked_threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Minimum number of liking users required for an item to be eligible.
    #[serde(default = "default_min_support")]
    pub min_support: usize,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_scoring_concurrency")]
    pub scoring_concurrency: usize,
    /// Cancel the run after this many milliseconds. `None` means no deadline.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

// Default functions
fn default_ratings_path() -> String {
    "ratings.csv".to_string()
}
fn default_movies_path() -> String {
    "movies.csv".to_string()
}
fn default_liked_threshold() -> f64 {
    3.5
}
fn default_min_support() -> usize {
    10
}
fn default_top_n() -> usize {
    20
}
fn default_scoring_concurrency() -> usize {
    2
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ratings_path: default_ratings_path(),
            movies_path: default_movies_path(),
            liked_threshold: default_liked_threshold(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_support: default_min_support(),
            top_n: default_top_n(),
            scoring_concurrency: default_scoring_concurrency(),
            timeout_ms: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from `movierec.toml` (if present) and the environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("movierec").required(false))
            .add_source(
                config::Environment::with_prefix("MOVIEREC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        debug!("Configuration sources resolved");
        config.try_deserialize()
    }

    pub fn validate(&self) -> RecResult<()> {
        if !self.ingest.liked_threshold.is_finite() {
            return Err(RecError::Config(format!(
                "liked_threshold must be a finite number, got {}",
                self.ingest.liked_threshold
            )));
        }
        if self.pipeline.scoring_concurrency == 0 {
            return Err(RecError::Config(
                "scoring_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
