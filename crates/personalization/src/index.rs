//! Read-only preference index shared by every scoring worker.
//!
//! The index is fully built before the pipeline starts and only exposes
//! `&self` accessors afterwards, so it can sit behind an `Arc` and be read
//! from many tasks without locking.

use movierec_core::{ItemId, UserId, UserProfile};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct PreferenceIndex {
    profiles: HashMap<UserId, UserProfile>,
    /// Item -> ids of users who liked it, ascending.
    item_likes: HashMap<ItemId, Vec<UserId>>,
}

impl PreferenceIndex {
    /// Group every liked item by the users who liked it in a single pass.
    pub fn build(profiles: impl IntoIterator<Item = UserProfile>) -> Self {
        let profiles: HashMap<UserId, UserProfile> =
            profiles.into_iter().map(|p| (p.user_id, p)).collect();

        let mut item_likes: HashMap<ItemId, Vec<UserId>> = HashMap::new();
        for (uid, profile) in &profiles {
            for item_id in &profile.liked {
                item_likes.entry(*item_id).or_default().push(*uid);
            }
        }
        for likers in item_likes.values_mut() {
            likers.sort_unstable();
        }

        debug!(
            users = profiles.len(),
            liked_items = item_likes.len(),
            "Preference index built"
        );

        Self {
            profiles,
            item_likes,
        }
    }

    pub fn profile(&self, user_id: UserId) -> Option<&UserProfile> {
        self.profiles.get(&user_id)
    }

    /// Users who liked the item. Empty when nobody did.
    pub fn likers(&self, item_id: ItemId) -> &[UserId] {
        self.item_likes
            .get(&item_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn like_count(&self, item_id: ItemId) -> usize {
        self.likers(item_id).len()
    }

    pub fn user_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn liked_item_count(&self) -> usize {
        self.item_likes.len()
    }
}

impl FromIterator<UserProfile> for PreferenceIndex {
    fn from_iter<T: IntoIterator<Item = UserProfile>>(iter: T) -> Self {
        Self::build(iter)
    }
}
