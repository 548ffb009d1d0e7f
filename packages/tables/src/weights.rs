//! Weight table CSV.
//!
//! Columns follow [`WeightRecord`]'s field order; null fields are written
//! as empty cells.

use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use levee_census_weights_models::WeightRecord;

use crate::TableError;

/// Writes weight records as CSV.
///
/// # Errors
///
/// Returns an error if a record cannot be written.
pub fn write_weight_table<W: Write>(writer: W, records: &[WeightRecord]) -> Result<(), TableError> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes weight records to a CSV file.
///
/// # Errors
///
/// See [`write_weight_table`]; also fails if the file cannot be created.
pub fn write_weight_csv(path: &Path, records: &[WeightRecord]) -> Result<(), TableError> {
    write_weight_table(File::create(path)?, records)?;
    log::info!("Wrote {} weight row(s) to {}", records.len(), path.display());
    Ok(())
}

/// Reads weight records previously written by [`write_weight_table`].
///
/// # Errors
///
/// Returns an error if the CSV is malformed.
pub fn read_weight_table<R: Read>(reader: R) -> Result<Vec<WeightRecord>, TableError> {
    let mut reader = csv::Reader::from_reader(reader);
    Ok(reader.deserialize().collect::<Result<Vec<_>, _>>()?)
}

/// Reads weight records from a CSV file.
///
/// # Errors
///
/// See [`read_weight_table`]; also fails if the file cannot be opened.
pub fn read_weight_csv(path: &Path) -> Result<Vec<WeightRecord>, TableError> {
    let records = read_weight_table(File::open(path)?)?;
    log::info!("Read {} weight row(s) from {}", records.len(), path.display());
    Ok(records)
}
