use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub type UserId = i64;
pub type ItemId = i64;

/// A user's rating history split into liked and not-liked items.
///
/// An item sits in at most one of the two sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub liked: HashSet<ItemId>,
    pub not_liked: HashSet<ItemId>,
}

impl UserProfile {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    /// Record a rating. A later rating of the same item replaces the earlier one.
    pub fn record_rating(&mut self, item_id: ItemId, rating: f64, liked_threshold: f64) {
        if rating >= liked_threshold {
            self.not_liked.remove(&item_id);
            self.liked.insert(item_id);
        } else {
            self.liked.remove(&item_id);
            self.not_liked.insert(item_id);
        }
    }

    pub fn has_rated(&self, item_id: ItemId) -> bool {
        self.liked.contains(&item_id) || self.not_liked.contains(&item_id)
    }

    pub fn rated_count(&self) -> usize {
        self.liked.len() + self.not_liked.len()
    }
}

/// A draft recommendation travelling through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationCandidate {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub title: String,
    /// Average similarity between the target and the users who liked the item.
    pub score: f64,
    /// Number of users who liked the item.
    pub support_count: usize,
}

impl RecommendationCandidate {
    pub fn new(user_id: UserId, item_id: ItemId, title: impl Into<String>) -> Self {
        Self {
            user_id,
            item_id,
            title: title.into(),
            score: 0.0,
            support_count: 0,
        }
    }
}

impl fmt::Display for RecommendationCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {:.4} [ {}]", self.title, self.score, self.support_count)
    }
}
