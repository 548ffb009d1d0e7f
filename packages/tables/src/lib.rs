#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tabular data at rest.
//!
//! Reads the tract attribute table and optional target metadata from CSV,
//! and writes the weight table and the aggregated output table back out.
//! Missing-value sentinels are converted to nulls here, at the boundary,
//! so nothing downstream ever compares against them.

pub mod attributes;
pub mod metadata;
pub mod output;
pub mod weights;

use levee_census_aggregate::AggregateError;
use thiserror::Error;

pub use attributes::{
    AttributeReadOptions, AttributeReadReport, read_attribute_csv, read_attribute_table,
};
pub use metadata::{read_target_metadata, read_target_metadata_csv};
pub use output::{output_headers, write_aggregated_csv, write_aggregated_table};
pub use weights::{read_weight_csv, read_weight_table, write_weight_csv, write_weight_table};

/// Errors reading or writing tables.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required column is absent from the header row.
    #[error("Column {column} not found in header")]
    MissingColumn { column: String },

    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}
