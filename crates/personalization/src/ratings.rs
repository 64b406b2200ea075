//! Ratings ingestion — turns `userId,movieId,rating,timestamp` rows into
//! per-user liked / not-liked profiles.

use crate::reader::{csv_reader, expect_fields, map_csv_error, parse_field};
use movierec_core::{ItemId, RecResult, UserId, UserProfile};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

const RATING_FIELDS: usize = 4;

/// A single parsed interaction row.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingRecord {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub rating: f64,
    /// Kept as read; only its presence is checked.
    pub timestamp: String,
}

pub fn load_profiles(
    path: impl AsRef<Path>,
    liked_threshold: f64,
) -> RecResult<HashMap<UserId, UserProfile>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let profiles = profiles_from_reader(file, &path.display().to_string(), liked_threshold)?;
    info!(
        path = %path.display(),
        users = profiles.len(),
        liked_threshold,
        "Ratings loaded"
    );
    Ok(profiles)
}

/// Parse every row before building any profile; a malformed row fails the load.
pub fn profiles_from_reader<R: Read>(
    input: R,
    source_name: &str,
    liked_threshold: f64,
) -> RecResult<HashMap<UserId, UserProfile>> {
    let records = read_ratings(input, source_name)?;
    Ok(build_profiles(&records, liked_threshold))
}

pub fn read_ratings<R: Read>(input: R, source_name: &str) -> RecResult<Vec<RatingRecord>> {
    let mut reader = csv_reader(input);
    let mut records = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|e| map_csv_error(source_name, e))?;
        expect_fields(source_name, &record, RATING_FIELDS)?;
        records.push(RatingRecord {
            user_id: parse_field(source_name, &record, 0, "userID integer")?,
            item_id: parse_field(source_name, &record, 1, "movieID integer")?,
            rating: parse_field(source_name, &record, 2, "rating")?,
            timestamp: record.get(3).unwrap_or_default().to_string(),
        });
    }

    Ok(records)
}

/// Group records by user. Records are applied in input order.
pub fn build_profiles(
    records: &[RatingRecord],
    liked_threshold: f64,
) -> HashMap<UserId, UserProfile> {
    let mut profiles: HashMap<UserId, UserProfile> = HashMap::new();
    for r in records {
        profiles
            .entry(r.user_id)
            .or_insert_with(|| UserProfile::new(r.user_id))
            .record_rating(r.item_id, r.rating, liked_threshold);
    }
    profiles
}
