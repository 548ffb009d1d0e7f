#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tract-to-levee interpolation, start to finish.
//!
//! Loads and projects both polygon layers, computes the weight table,
//! reads the tract attributes and variable manifest, aggregates, and
//! collects every diagnostic into a [`RunSummary`].

pub mod inputs;
pub mod run;
pub mod summary;

use levee_census_aggregate::AggregateError;
use levee_census_geography::GeographyError;
use levee_census_tables::TableError;
use levee_census_weights::WeightError;
use thiserror::Error;

pub use inputs::{AttributeInputs, ProjectionChoice, RegionInputs};
pub use run::{PipelineOutput, run};
pub use summary::RunSummary;

/// Errors that abort a pipeline step.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Geography(#[from] GeographyError),

    #[error(transparent)]
    Weights(#[from] WeightError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A projection had to be fitted or chosen from regions but there were
    /// none to look at.
    #[error("Cannot choose a projection: {layer} layer has no regions")]
    NoRegions { layer: &'static str },
}
