//! Item catalog — id to title mapping loaded from `movieId,title,genres` CSV.

use crate::reader::{csv_reader, expect_fields, map_csv_error, parse_field};
use movierec_core::{ItemId, RecResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

const CATALOG_FIELDS: usize = 3;

/// Ordered catalog of recommendable items. Iteration is by ascending item id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    titles: BTreeMap<ItemId, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_path(path: impl AsRef<Path>) -> RecResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let catalog = Self::from_reader(file, &path.display().to_string())?;
        info!(path = %path.display(), items = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    /// Parse catalog rows. Any malformed row aborts the whole load.
    pub fn from_reader<R: Read>(input: R, source_name: &str) -> RecResult<Self> {
        let mut reader = csv_reader(input);
        let mut titles = BTreeMap::new();

        for result in reader.records() {
            let record = result.map_err(|e| map_csv_error(source_name, e))?;
            expect_fields(source_name, &record, CATALOG_FIELDS)?;
            let item_id: ItemId = parse_field(source_name, &record, 0, "movieID integer")?;
            let title = record.get(1).unwrap_or_default().to_string();
            titles.insert(item_id, title);
        }

        Ok(Self { titles })
    }

    pub fn title(&self, item_id: ItemId) -> Option<&str> {
        self.titles.get(&item_id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &str)> {
        self.titles.iter().map(|(id, title)| (*id, title.as_str()))
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(ItemId, S)> for Catalog {
    fn from_iter<T: IntoIterator<Item = (ItemId, S)>>(iter: T) -> Self {
        Self {
            titles: iter.into_iter().map(|(id, t)| (id, t.into())).collect(),
        }
    }
}
