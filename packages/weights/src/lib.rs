#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Areal interpolation weights from polygon overlay.
//!
//! Intersects every target region (leveed area) with the source regions
//! (census tracts) it overlaps and derives the two weights the aggregation
//! step needs. Work is fanned out target-by-target over an explicit
//! [`context::ExecutionContext`]; each target is independent, so a failure
//! in one never touches the others.

pub mod context;
pub mod engine;
pub mod index;
mod isolate;
pub mod progress;

use thiserror::Error;

pub use context::ExecutionContext;
pub use engine::{WeightEngine, WeightOptions, compute_weights};

/// Errors that abort a whole weighting run.
///
/// Failures local to a single target are not errors; they are recorded in
/// the weight table's diagnostics.
#[derive(Debug, Error)]
pub enum WeightError {
    /// Targets and sources were declared in different coordinate systems.
    #[error("CRS mismatch: targets are in {targets}, sources are in {sources}")]
    CrsMismatch {
        /// CRS of the target set.
        targets: String,
        /// CRS of the source set.
        sources: String,
    },

    /// The shared CRS would distort area ratios.
    #[error("{crs} is not an equal-area projection; project both layers before weighting")]
    NotEqualArea {
        /// The offending CRS.
        crs: String,
    },

    /// The worker pool could not be started.
    #[error("Worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
