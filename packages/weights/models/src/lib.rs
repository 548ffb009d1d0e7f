#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Weight table types.
//!
//! A [`WeightRecord`] relates one target region (leveed area) to one
//! overlapping source region (census tract). Records are pure derived
//! facts, recomputed from geometry on every run.

use serde::{Deserialize, Serialize};

/// One (target, source) overlap, or the single placeholder row emitted for
/// a target that overlaps nothing.
///
/// Field order matches the column order of the weight table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRecord {
    pub target_id: String,
    /// `None` only on a placeholder row.
    pub source_id: Option<String>,
    pub intersection_area: Option<f64>,
    /// Area of the source region, copied from the source set.
    pub source_area: Option<f64>,
    /// Share of the target's total overlap contributed by this source.
    /// Sums to 1.0 over a target's intersecting records.
    pub weight_for_average: Option<f64>,
    /// Share of the source region lying inside the target.
    pub weight_for_total: Option<f64>,
    pub has_intersection: bool,
}

impl WeightRecord {
    /// The placeholder row for a target with no usable overlap. All
    /// numeric fields are null so downstream joins see missing data.
    #[must_use]
    pub fn no_intersection(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            source_id: None,
            intersection_area: None,
            source_area: None,
            weight_for_average: None,
            weight_for_total: None,
            has_intersection: false,
        }
    }
}

/// A target whose overlay computation failed and was replaced by a
/// placeholder row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryFailure {
    pub target_id: String,
    pub message: String,
}

/// A source region whose geometry could not be prepared. It is left out of
/// the index, so no target receives weight from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source_id: String,
    pub message: String,
}

/// A `weight_for_total` outside `[0, 1]` beyond tolerance (or undefined
/// because the source area is not positive). Points at a wrong or
/// non-equal-area projection upstream. The weight is kept as computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegenerateWeight {
    pub target_id: String,
    pub source_id: String,
    pub intersection_area: f64,
    pub source_area: f64,
    pub weight_for_total: Option<f64>,
}

/// Per-run bookkeeping of the overlay step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightDiagnostics {
    pub targets_processed: usize,
    /// Targets emitted as placeholder rows, including geometry failures.
    pub targets_without_intersection: usize,
    pub geometry_failures: Vec<GeometryFailure>,
    /// Sources dropped before the overlay.
    pub source_failures: Vec<SourceFailure>,
    pub repaired_targets: usize,
    pub repaired_sources: usize,
    pub degenerate_weights: Vec<DegenerateWeight>,
}

/// Output of the overlay step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightTable {
    pub records: Vec<WeightRecord>,
    pub diagnostics: WeightDiagnostics,
}

impl WeightTable {
    /// Records of one target, in table order.
    pub fn for_target<'a>(&'a self, target_id: &'a str) -> impl Iterator<Item = &'a WeightRecord> {
        self.records.iter().filter(move |r| r.target_id == target_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_has_null_numerics() {
        let record = WeightRecord::no_intersection("5105000001");
        assert!(!record.has_intersection);
        assert!(record.source_id.is_none());
        assert!(record.intersection_area.is_none());
        assert!(record.weight_for_average.is_none());
        assert!(record.weight_for_total.is_none());
    }
}
