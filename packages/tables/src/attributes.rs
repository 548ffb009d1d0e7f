//! Attribute CSV ingestion.
//!
//! The file has one id column plus any number of numeric columns. Every
//! numeric cell is parsed into an `Option<f64>`: empty cells, unparsable
//! cells and configured sentinels all become `None`.

use std::{fs::File, io::Read, path::Path};

use levee_census_aggregate::{AttributeTable, normalize_sentinel};
use levee_census_aggregate_models::ACS_MISSING_SENTINEL;
use levee_census_geography_models::TractId;
use serde::Serialize;

use crate::TableError;

/// Default name of the id column.
pub const DEFAULT_ID_COLUMN: &str = "source_id";

/// How an attribute CSV is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeReadOptions {
    pub id_column: String,
    pub sentinels: Vec<f64>,
    /// Parse ids as tract GEOIDs, left-padding short all-digit ids and
    /// skipping rows whose id cannot be a tract.
    pub normalize_tract_ids: bool,
}

impl Default for AttributeReadOptions {
    fn default() -> Self {
        Self {
            id_column: DEFAULT_ID_COLUMN.to_string(),
            sentinels: vec![ACS_MISSING_SENTINEL],
            normalize_tract_ids: true,
        }
    }
}

impl AttributeReadOptions {
    #[must_use]
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    #[must_use]
    pub fn with_sentinels(mut self, sentinels: Vec<f64>) -> Self {
        self.sentinels = sentinels;
        self
    }

    #[must_use]
    pub const fn with_tract_ids(mut self, normalize: bool) -> Self {
        self.normalize_tract_ids = normalize;
        self
    }
}

/// Counts gathered while reading an attribute CSV.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttributeReadReport {
    pub rows: usize,
    /// Rows skipped because the id is not a valid tract GEOID.
    pub invalid_ids: usize,
    /// Empty cells and sentinel values.
    pub missing_cells: usize,
    /// Cells that were not numbers.
    pub unparsable_cells: usize,
}

/// Reads an attribute table from CSV.
///
/// # Errors
///
/// * The CSV is malformed or the id column is missing
/// * A source id appears twice
pub fn read_attribute_table<R: Read>(
    reader: R,
    options: &AttributeReadOptions,
) -> Result<(AttributeTable, AttributeReadReport), TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let id_index = headers
        .iter()
        .position(|h| h == options.id_column)
        .ok_or_else(|| TableError::MissingColumn {
            column: options.id_column.clone(),
        })?;

    let value_columns: Vec<usize> = (0..headers.len()).filter(|i| *i != id_index).collect();
    let mut table = AttributeTable::new(
        value_columns
            .iter()
            .filter_map(|i| headers.get(*i))
            .map(String::from)
            .collect(),
    );
    let mut report = AttributeReadReport::default();

    for result in reader.records() {
        let record = result?;
        let raw_id = record.get(id_index).unwrap_or("");

        let source_id = if options.normalize_tract_ids {
            match TractId::parse(raw_id) {
                Ok(id) => id.as_str().to_string(),
                Err(e) => {
                    log::warn!("Skipping attribute row with id {raw_id:?}: {e}");
                    report.invalid_ids += 1;
                    continue;
                }
            }
        } else {
            raw_id.to_string()
        };

        let mut values = Vec::with_capacity(value_columns.len());
        for i in &value_columns {
            values.push(parse_cell(
                record.get(*i).unwrap_or(""),
                &options.sentinels,
                &mut report,
            ));
        }

        table.insert(source_id, values)?;
        report.rows += 1;
    }

    log::info!(
        "Read {} attribute row(s) with {} column(s); {} missing cell(s), {} unparsable, {} invalid id(s)",
        report.rows,
        table.columns().len(),
        report.missing_cells,
        report.unparsable_cells,
        report.invalid_ids
    );

    Ok((table, report))
}

/// Reads an attribute table from a CSV file.
///
/// # Errors
///
/// See [`read_attribute_table`]; also fails if the file cannot be opened.
pub fn read_attribute_csv(
    path: &Path,
    options: &AttributeReadOptions,
) -> Result<(AttributeTable, AttributeReadReport), TableError> {
    read_attribute_table(File::open(path)?, options)
}

fn parse_cell(cell: &str, sentinels: &[f64], report: &mut AttributeReadReport) -> Option<f64> {
    if cell.is_empty() {
        report.missing_cells += 1;
        return None;
    }
    let Ok(raw) = cell.parse::<f64>() else {
        report.unparsable_cells += 1;
        return None;
    };
    let value = normalize_sentinel(raw, sentinels);
    if value.is_none() {
        report.missing_cells += 1;
    }
    value
}
