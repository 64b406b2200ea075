//! Text rendering of pipeline outcomes.

use movierec_pipeline::RecommendationOutcome;
use std::fmt::Write;
use std::time::Duration;

pub fn render(outcome: &RecommendationOutcome) -> String {
    let mut out = String::new();
    match outcome {
        RecommendationOutcome::UserNotFound { user_id } => {
            let _ = writeln!(out, "User {} not found in ratings data.", user_id);
        }
        RecommendationOutcome::Ranked(recs) => {
            let _ = writeln!(out, "Recommendations for user # {}:", recs.user_id);
            for item in &recs.items {
                let _ = writeln!(out, "{}", item);
            }
        }
    }
    out
}

pub fn render_elapsed(elapsed: Duration) -> String {
    format!("\nExecution time: {:?}", elapsed)
}
