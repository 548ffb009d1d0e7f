#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry preparation for areal interpolation.
//!
//! Loads census tract and leveed-area polygons from `GeoJSON`, projects
//! them from longitude/latitude into an Albers equal-area CRS so that
//! area ratios are undistorted, and validates/repairs polygons before
//! they reach the overlay step.

pub mod load;
pub mod projection;
pub mod repair;

use thiserror::Error;

/// Errors that can occur while preparing geometries.
#[derive(Debug, Error)]
pub enum GeographyError {
    /// `GeoJSON` document could not be parsed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Input document was valid `GeoJSON` but not a `FeatureCollection`.
    #[error("Expected a GeoJSON FeatureCollection, found {found}")]
    NotFeatureCollection {
        /// The top-level object type that was found.
        found: &'static str,
    },

    /// A PROJ.4 definition could not be built or applied.
    #[error("Projection error: {message}")]
    Projection {
        /// Description of what went wrong.
        message: String,
    },

    /// Input was declared in a CRS that the requested operation cannot use.
    #[error("Cannot project regions declared in {crs}: input must be geographic (lon/lat)")]
    NotGeographic {
        /// Identifier of the offending CRS.
        crs: String,
    },
}
