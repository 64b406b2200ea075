//! movierec — collaborative-filtering movie recommendations.
//!
//! Loads the catalog and ratings, builds the preference index, and runs the
//! concurrent recommendation pipeline for one target user.

mod output;

use anyhow::Context;
use clap::Parser;
use movierec_core::config::AppConfig;
use movierec_core::UserId;
use movierec_personalization::{load_profiles, Catalog, PreferenceIndex};
use movierec_pipeline::{CancellationToken, RecommendationOutcome, RecommendationPipeline};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const DEFAULT_LOG_FILTER: &str =
    "movierec=info,movierec_core=info,movierec_personalization=info,movierec_pipeline=info";

#[derive(Parser, Debug)]
#[command(name = "movierec")]
#[command(about = "Recommend unseen movies from the ratings of similar users")]
#[command(version)]
struct Cli {
    /// Target user ID (prompted on stdin when omitted)
    #[arg(long)]
    user: Option<UserId>,

    /// Ratings CSV: userId,movieId,rating,timestamp (overrides config)
    #[arg(long, env = "MOVIEREC__INGEST__RATINGS_PATH")]
    ratings: Option<String>,

    /// Movies CSV: movieId,title,genres (overrides config)
    #[arg(long, env = "MOVIEREC__INGEST__MOVIES_PATH")]
    movies: Option<String>,

    /// Ratings at or above this value count as liked (overrides config)
    #[arg(long, env = "MOVIEREC__INGEST__LIKED_THRESHOLD")]
    liked_threshold: Option<f64>,

    /// Minimum number of liking users for an item to be recommended
    #[arg(long, env = "MOVIEREC__PIPELINE__MIN_SUPPORT")]
    min_support: Option<usize>,

    /// Number of recommendations to print
    #[arg(long, env = "MOVIEREC__PIPELINE__TOP_N")]
    top_n: Option<usize>,

    /// Number of concurrent scoring workers
    #[arg(long, env = "MOVIEREC__PIPELINE__SCORING_CONCURRENCY")]
    workers: Option<usize>,

    /// Cancel the pipeline after this many milliseconds
    #[arg(long, env = "MOVIEREC__PIPELINE__TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Print the full outcome as JSON instead of the text listing
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the recommendations.
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(path) = cli.ratings {
        config.ingest.ratings_path = path;
    }
    if let Some(path) = cli.movies {
        config.ingest.movies_path = path;
    }
    if let Some(threshold) = cli.liked_threshold {
        config.ingest.liked_threshold = threshold;
    }
    if let Some(min_support) = cli.min_support {
        config.pipeline.min_support = min_support;
    }
    if let Some(top_n) = cli.top_n {
        config.pipeline.top_n = top_n;
    }
    if let Some(workers) = cli.workers {
        config.pipeline.scoring_concurrency = workers;
    }
    if cli.timeout_ms.is_some() {
        config.pipeline.timeout_ms = cli.timeout_ms;
    }
    config.validate()?;

    info!(
        ratings = %config.ingest.ratings_path,
        movies = %config.ingest.movies_path,
        liked_threshold = config.ingest.liked_threshold,
        min_support = config.pipeline.min_support,
        top_n = config.pipeline.top_n,
        workers = config.pipeline.scoring_concurrency,
        "Configuration loaded"
    );

    let user_id = match cli.user {
        Some(id) => id,
        None => prompt_user_id().await?,
    };

    // Any malformed row aborts here, before the pipeline starts.
    let catalog = Catalog::from_path(&config.ingest.movies_path)
        .with_context(|| format!("failed to read {}", config.ingest.movies_path))?;
    let profiles = load_profiles(&config.ingest.ratings_path, config.ingest.liked_threshold)
        .with_context(|| format!("failed to read {}", config.ingest.ratings_path))?;
    let index = PreferenceIndex::build(profiles.into_values());
    info!(
        users = index.user_count(),
        liked_items = index.liked_item_count(),
        "Preference index ready"
    );

    let pipeline = RecommendationPipeline::new(
        Arc::new(index),
        Arc::new(catalog),
        config.pipeline.clone(),
    );

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling pipeline");
            interrupt.cancel();
        }
    });

    let start = Instant::now();
    let outcome = pipeline.run(user_id, &token).await?;
    let elapsed = start.elapsed();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    print!("{}", output::render(&outcome));
    if let RecommendationOutcome::Ranked(recs) = &outcome {
        if recs.cancelled {
            warn!(returned = recs.items.len(), "Results are partial: pipeline was cancelled");
        }
        println!("{}", output::render_elapsed(elapsed));
    }

    Ok(())
}

async fn prompt_user_id() -> anyhow::Result<UserId> {
    println!("Enter user ID :");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read user ID from stdin")?;
    parse_user_id(&line)
}

/// An empty answer or end of input selects user 0.
fn parse_user_id(line: &str) -> anyhow::Result<UserId> {
    let raw = line.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse()
        .with_context(|| format!("invalid user ID '{}'", raw))
}
