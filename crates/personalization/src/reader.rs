//! Shared CSV plumbing for the catalog and ratings loaders.

use csv::StringRecord;
use movierec_core::{RecError, RecResult};
use std::fmt::Display;
use std::io::Read;
use std::str::FromStr;

/// Reader that skips the header row and leaves field-count checks to the caller.
/// Fields are not trimmed.
pub(crate) fn csv_reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(input)
}

pub(crate) fn map_csv_error(source_name: &str, err: csv::Error) -> RecError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    match err.into_kind() {
        csv::ErrorKind::Io(e) => RecError::Io(e),
        kind => RecError::malformed(source_name, line, format!("{kind:?}")),
    }
}

pub(crate) fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

pub(crate) fn expect_fields(
    source_name: &str,
    record: &StringRecord,
    expected: usize,
) -> RecResult<()> {
    if record.len() != expected {
        return Err(RecError::malformed(
            source_name,
            line_of(record),
            format!(
                "each line must contain exactly {} fields, but found {}",
                expected,
                record.len()
            ),
        ));
    }
    Ok(())
}

pub(crate) fn parse_field<T>(
    source_name: &str,
    record: &StringRecord,
    idx: usize,
    field_name: &str,
) -> RecResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = record.get(idx).unwrap_or_default();
    raw.parse::<T>().map_err(|e| {
        RecError::malformed(
            source_name,
            line_of(record),
            format!("cannot convert '{raw}' to {field_name}: {e}"),
        )
    })
}
