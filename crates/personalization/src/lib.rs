//! Preference data for collaborative filtering — catalog and ratings
//! ingestion, the read-only preference index, and user similarity.

pub mod catalog;
pub mod index;
mod reader;
pub mod ratings;
pub mod similarity;

pub use catalog::Catalog;
pub use index::PreferenceIndex;
pub use ratings::load_profiles;
pub use similarity::similarity;
