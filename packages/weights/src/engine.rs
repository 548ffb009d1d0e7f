//! Per-target overlay and weight derivation.
//!
//! For each target, every source whose bounding box touches the target's
//! is intersected with it. Non-empty intersections yield two weights:
//!
//! * `weight_for_average = intersection_area / Σ intersection_area` over
//!   the target's overlapping sources (sums to 1 per target);
//! * `weight_for_total = intersection_area / source_area` (the share of
//!   the source lying inside the target).
//!
//! A target with no overlap, or whose overlay fails, yields exactly one
//! placeholder record so it is carried downstream as missing data.

use geo::{Area, BooleanOps, BoundingRect};
use levee_census_geography::repair::validate_or_repair;
use levee_census_geography_models::{Crs, RegionSet, SourceRegion, TargetRegion};
use levee_census_weights_models::{
    DegenerateWeight, GeometryFailure, WeightDiagnostics, WeightRecord, WeightTable,
};

use crate::WeightError;
use crate::context::ExecutionContext;
use crate::index::{IndexedSource, SourceIndex};
use crate::isolate::isolate;

/// Default slack allowed on `weight_for_total` before it is reported as
/// degenerate.
pub const DEFAULT_DEGENERATE_TOLERANCE: f64 = 1e-6;

/// Tunables for the overlay step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightOptions {
    /// `weight_for_total` outside `[-tol, 1 + tol]` is reported.
    pub degenerate_tolerance: f64,
}

impl Default for WeightOptions {
    fn default() -> Self {
        Self {
            degenerate_tolerance: DEFAULT_DEGENERATE_TOLERANCE,
        }
    }
}

/// Everything produced for one target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetWeights {
    pub records: Vec<WeightRecord>,
    pub failure: Option<GeometryFailure>,
    pub repaired: bool,
    pub degenerate: Vec<DegenerateWeight>,
}

impl TargetWeights {
    fn placeholder(target_id: &str, failure: Option<GeometryFailure>, repaired: bool) -> Self {
        Self {
            records: vec![WeightRecord::no_intersection(target_id)],
            failure,
            repaired,
            degenerate: Vec::new(),
        }
    }

    #[must_use]
    pub fn has_intersection(&self) -> bool {
        self.records.iter().any(|r| r.has_intersection)
    }
}

/// Non-empty intersections of one target, ordered by source id.
struct Overlay<'a> {
    pieces: Vec<(&'a IndexedSource, f64)>,
    repaired: bool,
}

/// Overlay engine bound to one immutable source set.
///
/// Cheap to share across workers: computing a target only reads the
/// index, so any subset of targets can be recomputed independently.
pub struct WeightEngine {
    index: SourceIndex,
    options: WeightOptions,
}

impl WeightEngine {
    #[must_use]
    pub fn new(sources: &[SourceRegion], options: WeightOptions) -> Self {
        Self {
            index: SourceIndex::build(sources),
            options,
        }
    }

    #[must_use]
    pub const fn index(&self) -> &SourceIndex {
        &self.index
    }

    /// Computes the weight records for a single target.
    ///
    /// Never fails: geometry errors and panics raised by the geometry
    /// library are caught and turned into a placeholder record plus a
    /// [`GeometryFailure`].
    #[must_use]
    pub fn compute_target(&self, target: &TargetRegion) -> TargetWeights {
        let target_id = target.target_id();

        let overlay = match isolate(|| self.overlay(target)) {
            Ok(overlay) => overlay,
            Err(message) => {
                log::warn!("Overlay failed for target {target_id}: {message}");
                let failure = GeometryFailure {
                    target_id: target_id.to_string(),
                    message,
                };
                return TargetWeights::placeholder(target_id, Some(failure), false);
            }
        };

        if overlay.pieces.is_empty() {
            log::debug!("Target {target_id} intersects no source region");
            return TargetWeights::placeholder(target_id, None, overlay.repaired);
        }

        let overlap_total: f64 = overlay.pieces.iter().map(|(_, area)| area).sum();
        let tolerance = self.options.degenerate_tolerance;
        let mut records = Vec::with_capacity(overlay.pieces.len());
        let mut degenerate = Vec::new();

        for (source, intersection_area) in overlay.pieces {
            let weight_for_total =
                (source.area > 0.0).then(|| intersection_area / source.area);

            let out_of_range =
                weight_for_total.is_none_or(|w| w < -tolerance || w > 1.0 + tolerance);
            if out_of_range {
                log::error!(
                    "Degenerate weight_for_total {weight_for_total:?} for target {target_id} / \
                     source {} (intersection {intersection_area}, source area {}); \
                     check that both layers share an equal-area projection",
                    source.source_id,
                    source.area,
                );
                degenerate.push(DegenerateWeight {
                    target_id: target_id.to_string(),
                    source_id: source.source_id.clone(),
                    intersection_area,
                    source_area: source.area,
                    weight_for_total,
                });
            }

            records.push(WeightRecord {
                target_id: target_id.to_string(),
                source_id: Some(source.source_id.clone()),
                intersection_area: Some(intersection_area),
                source_area: Some(source.area),
                weight_for_average: Some(intersection_area / overlap_total),
                weight_for_total,
                has_intersection: true,
            });
        }

        TargetWeights {
            records,
            failure: None,
            repaired: overlay.repaired,
            degenerate,
        }
    }

    fn overlay<'a>(&'a self, target: &TargetRegion) -> Result<Overlay<'a>, String> {
        let prepared = validate_or_repair(&target.geometry);
        if prepared.repaired {
            log::debug!("Repaired invalid geometry for target {}", target.target_id());
        }

        let mut pieces = Vec::new();
        if let Some(rect) = prepared.geometry.bounding_rect() {
            for source in self.index.candidates(rect) {
                let area = prepared
                    .geometry
                    .intersection(&source.geometry)
                    .unsigned_area();
                if !area.is_finite() {
                    return Err(format!(
                        "non-finite intersection area with source {}",
                        source.source_id
                    ));
                }
                if area > 0.0 {
                    pieces.push((source, area));
                }
            }
        }

        // R-tree traversal order is an implementation detail; fix the order
        // so sums (and therefore output) are reproducible.
        pieces.sort_by(|a, b| a.0.source_id.cmp(&b.0.source_id));

        Ok(Overlay {
            pieces,
            repaired: prepared.repaired,
        })
    }
}

/// Computes the weight table for every target against every source.
///
/// Targets are fanned out over the context's pool; each target is an
/// isolated unit of work and results are concatenated in input order.
///
/// # Errors
///
/// Returns an error if the two sets declare different CRSs or the shared
/// CRS is not equal-area. Per-target failures never abort the run; they
/// are recorded in the table's diagnostics.
pub fn compute_weights(
    targets: &RegionSet<TargetRegion>,
    sources: &RegionSet<SourceRegion>,
    ctx: &ExecutionContext,
    options: WeightOptions,
) -> Result<WeightTable, WeightError> {
    check_crs(&targets.crs, &sources.crs)?;

    log::info!(
        "Computing weights for {} targets against {} sources in {} using {} worker(s)",
        targets.len(),
        sources.len(),
        targets.crs.id,
        ctx.workers()
    );

    let engine = WeightEngine::new(&sources.regions, options);
    ctx.progress().label(&format!(
        "{} leveed areas x {} tracts",
        targets.len(),
        engine.index().len()
    ));

    let outcomes = ctx.map_units(&targets.regions, |target| engine.compute_target(target));

    let mut diagnostics = WeightDiagnostics {
        targets_processed: outcomes.len(),
        repaired_sources: engine.index().repaired(),
        source_failures: engine.index().failures().to_vec(),
        ..WeightDiagnostics::default()
    };
    let mut records = Vec::new();

    for outcome in outcomes {
        if !outcome.has_intersection() {
            diagnostics.targets_without_intersection += 1;
        }
        if outcome.repaired {
            diagnostics.repaired_targets += 1;
        }
        diagnostics.geometry_failures.extend(outcome.failure);
        diagnostics.degenerate_weights.extend(outcome.degenerate);
        records.extend(outcome.records);
    }

    log::info!(
        "Weight table: {} records, {} target(s) without intersection, {} geometry failure(s), \
         {} dropped source(s), {} degenerate weight(s)",
        records.len(),
        diagnostics.targets_without_intersection,
        diagnostics.geometry_failures.len(),
        diagnostics.source_failures.len(),
        diagnostics.degenerate_weights.len()
    );

    Ok(WeightTable {
        records,
        diagnostics,
    })
}

/// Verifies both sets share one equal-area CRS.
///
/// # Errors
///
/// Returns [`WeightError::CrsMismatch`] or [`WeightError::NotEqualArea`].
pub fn check_crs(targets: &Crs, sources: &Crs) -> Result<(), WeightError> {
    if targets != sources {
        return Err(WeightError::CrsMismatch {
            targets: targets.id.clone(),
            sources: sources.id.clone(),
        });
    }
    if !targets.is_equal_area() {
        return Err(WeightError::NotEqualArea {
            crs: targets.id.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, Rect};
    use levee_census_geography_models::{CrsKind, TargetMetadata};

    use super::*;

    fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Rect::new((min_x, min_y), (max_x, max_y)).to_polygon()])
    }

    fn target(id: &str, geometry: MultiPolygon<f64>) -> TargetRegion {
        TargetRegion::new(TargetMetadata::new(id), geometry)
    }

    fn albers() -> Crs {
        Crs::equal_area("EPSG:5070")
    }

    fn assert_close(actual: f64, expected: f64) {
        let tol = 1e-6 * expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    fn tracts() -> RegionSet<SourceRegion> {
        RegionSet::new(
            albers(),
            vec![
                SourceRegion::new("22071000100", rect(0.0, 0.0, 10.0, 10.0)),
                SourceRegion::new("22071000200", rect(10.0, 0.0, 30.0, 10.0)),
                SourceRegion::new("22071000300", rect(0.0, 10.0, 30.0, 20.0)),
            ],
        )
    }

    #[test]
    fn average_weights_sum_to_one() {
        let engine = WeightEngine::new(&tracts().regions, WeightOptions::default());
        let result = engine.compute_target(&target("L1", rect(5.0, 5.0, 15.0, 15.0)));

        assert_eq!(result.records.len(), 3);
        let sum: f64 = result
            .records
            .iter()
            .filter_map(|r| r.weight_for_average)
            .sum();
        assert_close(sum, 1.0);

        for record in &result.records {
            let w = record.weight_for_total.unwrap();
            assert!((0.0..=1.0 + 1e-9).contains(&w));
        }
    }

    #[test]
    fn straddling_target_splits_by_intersection_area() {
        let engine = WeightEngine::new(&tracts().regions, WeightOptions::default());
        let result = engine.compute_target(&target("L2", rect(3.0, 0.0, 13.0, 10.0)));

        assert_eq!(result.records.len(), 2);
        let a = &result.records[0];
        let b = &result.records[1];
        assert_eq!(a.source_id.as_deref(), Some("22071000100"));
        assert_eq!(b.source_id.as_deref(), Some("22071000200"));

        assert_close(a.intersection_area.unwrap(), 70.0);
        assert_close(b.intersection_area.unwrap(), 30.0);
        assert_close(a.weight_for_average.unwrap(), 0.7);
        assert_close(b.weight_for_average.unwrap(), 0.3);
        assert_close(a.weight_for_total.unwrap(), 0.7);
        assert_close(b.weight_for_total.unwrap(), 0.15);
        assert_close(b.source_area.unwrap(), 200.0);
        assert!(a.has_intersection && b.has_intersection);
    }

    #[test]
    fn boundary_touch_is_not_an_intersection() {
        let engine = WeightEngine::new(&tracts().regions, WeightOptions::default());
        let result = engine.compute_target(&target("edge", rect(30.0, 0.0, 40.0, 10.0)));

        assert_eq!(result.records, vec![WeightRecord::no_intersection("edge")]);
        assert!(result.failure.is_none());
    }

    #[test]
    fn unclamped_weight_is_reported_as_degenerate() {
        // Cached area disagrees with the geometry, as happens when the area
        // came from a different projection.
        let sources = vec![SourceRegion::with_area(
            "22071000100",
            rect(0.0, 0.0, 10.0, 10.0),
            50.0,
        )];
        let engine = WeightEngine::new(&sources, WeightOptions::default());
        let result = engine.compute_target(&target("L1", rect(-1.0, -1.0, 11.0, 11.0)));

        assert_eq!(result.degenerate.len(), 1);
        assert_close(result.records[0].weight_for_total.unwrap(), 2.0);
        assert_close(result.records[0].weight_for_average.unwrap(), 1.0);
    }

    #[test]
    fn zero_area_source_has_undefined_total_weight() {
        let sources = vec![SourceRegion::with_area(
            "22071000100",
            rect(0.0, 0.0, 10.0, 10.0),
            0.0,
        )];
        let engine = WeightEngine::new(&sources, WeightOptions::default());
        let result = engine.compute_target(&target("L1", rect(0.0, 0.0, 5.0, 5.0)));

        assert!(result.records[0].weight_for_total.is_none());
        assert_eq!(result.degenerate.len(), 1);
        assert!(result.degenerate[0].weight_for_total.is_none());
    }

    #[test]
    fn no_overlap_targets_appear_exactly_once() {
        let ctx = ExecutionContext::sequential().unwrap();
        let targets = RegionSet::new(
            albers(),
            vec![
                target("inside", rect(1.0, 1.0, 3.0, 3.0)),
                target("far", rect(100.0, 100.0, 110.0, 110.0)),
            ],
        );
        let table = compute_weights(&targets, &tracts(), &ctx, WeightOptions::default()).unwrap();

        let far: Vec<_> = table.for_target("far").collect();
        assert_eq!(far.len(), 1);
        assert!(!far[0].has_intersection);
        assert_eq!(table.diagnostics.targets_processed, 2);
        assert_eq!(table.diagnostics.targets_without_intersection, 1);
        assert!(table.diagnostics.geometry_failures.is_empty());
    }

    #[test]
    fn broken_target_becomes_placeholder_beside_healthy_one() {
        let ctx = ExecutionContext::new(2, crate::progress::silent()).unwrap();
        let targets = RegionSet::new(
            albers(),
            vec![
                target("broken", rect(f64::NAN, 0.0, 20.0, 10.0)),
                target("healthy", rect(3.0, 0.0, 13.0, 10.0)),
            ],
        );
        let table = compute_weights(&targets, &tracts(), &ctx, WeightOptions::default()).unwrap();

        let broken: Vec<_> = table.for_target("broken").collect();
        assert_eq!(broken, vec![&WeightRecord::no_intersection("broken")]);

        let failures: Vec<&str> = table
            .diagnostics
            .geometry_failures
            .iter()
            .map(|f| f.target_id.as_str())
            .collect();
        assert_eq!(failures, ["broken"]);
        assert_eq!(table.diagnostics.targets_processed, 2);
        assert_eq!(table.diagnostics.targets_without_intersection, 1);

        let healthy: Vec<_> = table.for_target("healthy").collect();
        assert_eq!(healthy.len(), 2);
        assert_close(healthy[0].weight_for_average.unwrap(), 0.7);
        assert_close(healthy[0].weight_for_total.unwrap(), 0.7);
        assert_close(healthy[1].weight_for_average.unwrap(), 0.3);
        assert_close(healthy[1].weight_for_total.unwrap(), 0.15);
    }

    #[test]
    fn broken_source_is_dropped_without_aborting() {
        let ctx = ExecutionContext::sequential().unwrap();
        let targets = RegionSet::new(albers(), vec![target("L1", rect(2.0, 2.0, 8.0, 8.0))]);
        let sources = RegionSet::new(
            albers(),
            vec![
                SourceRegion::new("22071000100", rect(0.0, 0.0, 10.0, 10.0)),
                SourceRegion::new("22071000200", rect(f64::NAN, 0.0, 20.0, 10.0)),
            ],
        );
        let table = compute_weights(&targets, &sources, &ctx, WeightOptions::default()).unwrap();

        assert_eq!(table.diagnostics.source_failures.len(), 1);
        assert_eq!(table.diagnostics.source_failures[0].source_id, "22071000200");
        assert!(table.diagnostics.geometry_failures.is_empty());

        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].source_id.as_deref(), Some("22071000100"));
        assert_close(table.records[0].weight_for_total.unwrap(), 0.36);
    }

    #[test]
    fn parallel_runs_are_identical() {
        let targets = RegionSet::new(
            albers(),
            (0..40)
                .map(|i| {
                    let x = f64::from(i) * 0.7;
                    target(&format!("L{i}"), rect(x, 2.0, x + 4.0, 14.0))
                })
                .collect(),
        );
        let sources = tracts();

        let first = compute_weights(
            &targets,
            &sources,
            &ExecutionContext::new(4, crate::progress::silent()).unwrap(),
            WeightOptions::default(),
        )
        .unwrap();
        let second = compute_weights(
            &targets,
            &sources,
            &ExecutionContext::new(2, crate::progress::silent()).unwrap(),
            WeightOptions::default(),
        )
        .unwrap();

        assert_eq!(first.records, second.records);
    }

    #[test]
    fn mismatched_crs_is_fatal() {
        let ctx = ExecutionContext::sequential().unwrap();
        let targets = RegionSet::new(Crs::nad83(), vec![target("L1", rect(0.0, 0.0, 1.0, 1.0))]);
        let err = compute_weights(&targets, &tracts(), &ctx, WeightOptions::default()).unwrap_err();
        assert!(matches!(err, WeightError::CrsMismatch { .. }));
    }

    #[test]
    fn geographic_crs_is_fatal() {
        let ctx = ExecutionContext::sequential().unwrap();
        let geographic = Crs {
            id: "EPSG:4269".to_string(),
            kind: CrsKind::Geographic,
        };
        let targets = RegionSet::new(
            geographic.clone(),
            vec![target("L1", rect(0.0, 0.0, 1.0, 1.0))],
        );
        let sources = RegionSet::new(geographic, tracts().regions);
        let err = compute_weights(&targets, &sources, &ctx, WeightOptions::default()).unwrap_err();
        assert!(matches!(err, WeightError::NotEqualArea { .. }));
    }
}
