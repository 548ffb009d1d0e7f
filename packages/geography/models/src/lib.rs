#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Source and target region types.
//!
//! Source regions (census tracts) are where attribute data was measured.
//! Target regions (leveed areas) are where estimates are wanted. Both are
//! loaded once by an upstream collaborator and treated as immutable by the
//! weighting and aggregation engines.

pub mod tract;

use geo::{Area, MultiPolygon};
use serde::{Deserialize, Serialize};

pub use tract::{TractId, TractIdError};

/// Broad classification of a coordinate reference system.
///
/// Only [`CrsKind::EqualArea`] is acceptable for computing overlay weights:
/// area ratios taken in any other system are distorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrsKind {
    /// Unprojected longitude/latitude degrees.
    Geographic,
    /// Planar projection that preserves area (e.g. Albers equal-area conic).
    EqualArea,
    /// Any other planar projection (UTM, Web Mercator, state plane, ...).
    Projected,
}

/// Coordinate reference system declared for a whole set of regions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    /// Authority identifier, e.g. `"EPSG:5070"`.
    pub id: String,
    /// What kind of system `id` names.
    pub kind: CrsKind,
}

impl Crs {
    /// NAD83 geographic coordinates (the datum of TIGER/Line files).
    #[must_use]
    pub fn nad83() -> Self {
        Self {
            id: "EPSG:4269".to_string(),
            kind: CrsKind::Geographic,
        }
    }

    /// WGS84 geographic coordinates.
    #[must_use]
    pub fn wgs84() -> Self {
        Self {
            id: "EPSG:4326".to_string(),
            kind: CrsKind::Geographic,
        }
    }

    /// An equal-area planar CRS identified by `id`.
    #[must_use]
    pub fn equal_area(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: CrsKind::EqualArea,
        }
    }

    #[must_use]
    pub const fn is_equal_area(&self) -> bool {
        matches!(self.kind, CrsKind::EqualArea)
    }
}

/// A census tract (or other source polygon) with its cached planar area.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRegion {
    /// Stable key joining the polygon to its attribute row.
    pub source_id: String,
    pub geometry: MultiPolygon<f64>,
    /// Planar area in the working projection's square units.
    pub area: f64,
}

impl SourceRegion {
    /// Builds a source region, computing and caching its area.
    #[must_use]
    pub fn new(source_id: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        let area = geometry.unsigned_area();
        Self {
            source_id: source_id.into(),
            geometry,
            area,
        }
    }

    /// Builds a source region with an area computed elsewhere.
    #[must_use]
    pub fn with_area(source_id: impl Into<String>, geometry: MultiPolygon<f64>, area: f64) -> Self {
        Self {
            source_id: source_id.into(),
            geometry,
            area,
        }
    }
}

/// Descriptive fields of a leveed area, carried through to the output
/// table but never used for weighting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetMetadata {
    pub target_id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Levee accreditation category (e.g. "Accredited", "Provisionally Accredited").
    #[serde(default)]
    pub accreditation: Option<String>,
    /// Area as reported by the levee inventory (not recomputed).
    #[serde(default)]
    pub area: Option<f64>,
    /// Levee length as reported by the levee inventory.
    #[serde(default)]
    pub length: Option<f64>,
}

impl TargetMetadata {
    /// Metadata carrying only an identifier.
    #[must_use]
    pub fn new(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            ..Self::default()
        }
    }
}

/// A leveed area polygon plus its pass-through metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRegion {
    pub geometry: MultiPolygon<f64>,
    pub metadata: TargetMetadata,
}

impl TargetRegion {
    #[must_use]
    pub const fn new(metadata: TargetMetadata, geometry: MultiPolygon<f64>) -> Self {
        Self { geometry, metadata }
    }

    #[must_use]
    pub fn target_id(&self) -> &str {
        &self.metadata.target_id
    }
}

/// A homogeneous set of regions sharing one declared CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSet<T> {
    pub crs: Crs,
    pub regions: Vec<T>,
}

impl<T> RegionSet<T> {
    #[must_use]
    pub const fn new(crs: Crs, regions: Vec<T>) -> Self {
        Self { crs, regions }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl RegionSet<TargetRegion> {
    /// Clones out the metadata of every target, in input order.
    #[must_use]
    pub fn metadata(&self) -> Vec<TargetMetadata> {
        self.regions.iter().map(|t| t.metadata.clone()).collect()
    }
}
