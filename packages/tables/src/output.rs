//! Aggregated output CSV.
//!
//! One row per target: the metadata columns, then five columns per
//! variable in manifest order. A variable that received no contribution
//! is written as five empty cells.

use std::{fs::File, io::Write, path::Path};

use levee_census_aggregate_models::{AggregatedAttribute, AggregatedTable};
use levee_census_geography_models::TargetMetadata;

use crate::TableError;

const METADATA_COLUMNS: [&str; 5] = ["target_id", "name", "accreditation", "area", "length"];

/// Header row for `table`.
#[must_use]
pub fn output_headers(table: &AggregatedTable) -> Vec<String> {
    let mut headers: Vec<String> = METADATA_COLUMNS.iter().map(ToString::to_string).collect();
    for variable in &table.variables {
        headers.extend(
            AggregatedAttribute::COLUMN_SUFFIXES
                .iter()
                .map(|suffix| format!("{variable}_{suffix}")),
        );
    }
    headers
}

/// Writes the aggregated table as CSV.
///
/// # Errors
///
/// Returns an error if a row cannot be written.
pub fn write_aggregated_table<W: Write>(
    writer: W,
    table: &AggregatedTable,
) -> Result<(), TableError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(output_headers(table))?;

    for row in &table.rows {
        let mut record = metadata_cells(&row.metadata);
        for attribute in &row.attributes {
            record.extend(attribute_cells(attribute.as_ref()));
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes the aggregated table to a CSV file.
///
/// # Errors
///
/// See [`write_aggregated_table`]; also fails if the file cannot be
/// created.
pub fn write_aggregated_csv(path: &Path, table: &AggregatedTable) -> Result<(), TableError> {
    write_aggregated_table(File::create(path)?, table)?;
    log::info!(
        "Wrote {} target row(s) x {} variable(s) to {}",
        table.rows.len(),
        table.variables.len(),
        path.display()
    );
    Ok(())
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn metadata_cells(metadata: &TargetMetadata) -> Vec<String> {
    vec![
        metadata.target_id.clone(),
        cell(metadata.name.as_deref()),
        cell(metadata.accreditation.as_deref()),
        cell(metadata.area),
        cell(metadata.length),
    ]
}

fn attribute_cells(attribute: Option<&AggregatedAttribute>) -> [String; 5] {
    attribute.map_or_else(Default::default, |a| {
        [
            cell(a.weighted_value),
            cell(a.weighted_moe),
            cell(a.coefficient_of_variation),
            a.n_source_regions_with_data.to_string(),
            a.total_weight_used.to_string(),
        ]
    })
}

#[cfg(test)]
mod tests {
    use levee_census_aggregate_models::TargetRow;

    use super::*;

    fn table() -> AggregatedTable {
        let mut named = TargetMetadata::new("L1");
        named.name = Some("Orleans East Bank".to_string());
        named.area = Some(2.5);

        AggregatedTable {
            variables: vec!["population".to_string()],
            rows: vec![
                TargetRow {
                    metadata: named,
                    attributes: vec![Some(AggregatedAttribute {
                        weighted_value: Some(1000.0),
                        weighted_moe: Some(0.0),
                        coefficient_of_variation: Some(0.0),
                        n_source_regions_with_data: 2,
                        total_weight_used: 0.85,
                    })],
                },
                TargetRow {
                    metadata: TargetMetadata::new("L2"),
                    attributes: vec![None],
                },
            ],
        }
    }

    #[test]
    fn writes_prefixed_columns_and_empty_cells() {
        let mut buf = Vec::new();
        write_aggregated_table(&mut buf, &table()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "target_id,name,accreditation,area,length,population_weighted_value,population_weighted_moe,population_CV,population_n_tracts_with_data,population_total_weight"
        );
        assert_eq!(lines[1], "L1,Orleans East Bank,,2.5,,1000,0,0,2,0.85");
        assert_eq!(lines[2], "L2,,,,,,,,,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_aggregated_csv(&path, &table()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("target_id,"));
        assert_eq!(text.lines().count(), 3);
    }
}
