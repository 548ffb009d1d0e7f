#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Applies areal weights to tract-level estimates.
//!
//! Each variable in the manifest is carried to the leveed areas with the
//! strategy its [`AggregationClass`](levee_census_aggregate_models::AggregationClass)
//! selects, and its margin of error is propagated alongside.

pub mod attributes;
pub mod cv;
pub mod engine;
pub mod manifest;
pub mod report;
pub mod strategy;

use thiserror::Error;

pub use attributes::{AttributeTable, normalize_sentinel};
pub use engine::{AggregationOutput, aggregate};
pub use manifest::{default_manifest, parse_manifest_toml};
pub use report::AggregationReport;

/// Aggregation errors.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Manifest TOML could not be parsed.
    #[error("Invalid variable manifest: {0}")]
    Manifest(#[from] toml::de::Error),

    /// Two manifest entries share a name.
    #[error("Variable {name} is declared more than once")]
    DuplicateVariable { name: String },

    /// An attribute row has the wrong number of cells.
    #[error("Attribute row {source_id} has {found} value(s), expected {expected}")]
    RowWidth {
        source_id: String,
        expected: usize,
        found: usize,
    },

    /// A source id appears twice in the attribute table.
    #[error("Source {source_id} appears more than once in the attribute table")]
    DuplicateSource { source_id: String },
}
