//! Jaccard agreement between two users' rating histories.

use movierec_core::UserProfile;

/// Shared likes plus shared dislikes, over every item either user rated.
///
/// Returns 0.0 when neither user has rated anything.
pub fn similarity(a: &UserProfile, b: &UserProfile) -> f64 {
    let agreements =
        a.liked.intersection(&b.liked).count() + a.not_liked.intersection(&b.not_liked).count();

    // Each profile's two sets are disjoint, so the union is both totals minus
    // the items rated by both users.
    let rated_by_both = a
        .liked
        .iter()
        .chain(a.not_liked.iter())
        .filter(|item| b.has_rated(**item))
        .count();
    let union = a.rated_count() + b.rated_count() - rated_by_both;

    if union == 0 {
        return 0.0;
    }
    agreements as f64 / union as f64
}
