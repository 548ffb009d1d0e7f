//! Target metadata CSV.
//!
//! An alternative to taking metadata from the leveed-area GeoJSON
//! properties. Columns are matched by name (`target_id`, `name`,
//! `accreditation`, `area`, `length`); all but `target_id` are optional and
//! extra columns are ignored.

use std::{fs::File, io::Read, path::Path};

use levee_census_geography_models::TargetMetadata;

use crate::TableError;

/// Reads target metadata rows.
///
/// # Errors
///
/// Returns an error if the CSV is malformed or lacks `target_id`.
pub fn read_target_metadata<R: Read>(reader: R) -> Result<Vec<TargetMetadata>, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    if !reader.headers()?.iter().any(|h| h == "target_id") {
        return Err(TableError::MissingColumn {
            column: "target_id".to_string(),
        });
    }

    let rows = reader
        .deserialize()
        .collect::<Result<Vec<TargetMetadata>, _>>()?;

    log::debug!("Read {} target metadata row(s)", rows.len());

    Ok(rows)
}

/// Reads target metadata from a CSV file.
///
/// # Errors
///
/// See [`read_target_metadata`]; also fails if the file cannot be opened.
pub fn read_target_metadata_csv(path: &Path) -> Result<Vec<TargetMetadata>, TableError> {
    read_target_metadata(File::open(path)?)
}
