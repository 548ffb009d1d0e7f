//! R-tree over source regions.
//!
//! Built once per run from the immutable source set and shared read-only
//! by every worker. Geometries are validated/repaired at build time so the
//! repair cost is paid once per tract, not once per overlapping target.

use geo::{BoundingRect, MultiPolygon, Rect};
use levee_census_geography::repair::validate_or_repair;
use levee_census_geography_models::SourceRegion;
use levee_census_weights_models::SourceFailure;
use rstar::{AABB, RTree, RTreeObject};

use crate::isolate::isolate;

/// A source polygon stored in the R-tree with its metadata.
pub struct IndexedSource {
    pub source_id: String,
    /// Cached area of the original region (not of the repaired geometry).
    pub area: f64,
    pub geometry: MultiPolygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedSource {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Spatial index over all source regions.
pub struct SourceIndex {
    tree: RTree<IndexedSource>,
    repaired: usize,
    failures: Vec<SourceFailure>,
}

impl SourceIndex {
    /// Repairs and indexes every source region. Regions with no bounding
    /// box (empty geometry) can never intersect anything and are dropped.
    /// A region whose repair panics is dropped and recorded in
    /// [`Self::failures`].
    #[must_use]
    pub fn build(sources: &[SourceRegion]) -> Self {
        let mut repaired = 0;
        let mut failures = Vec::new();
        let mut entries = Vec::with_capacity(sources.len());

        for source in sources {
            let prepared = match isolate(|| Ok(validate_or_repair(&source.geometry))) {
                Ok(prepared) => prepared,
                Err(message) => {
                    log::warn!(
                        "Dropping source {}: geometry could not be prepared: {message}",
                        source.source_id
                    );
                    failures.push(SourceFailure {
                        source_id: source.source_id.clone(),
                        message,
                    });
                    continue;
                }
            };
            if prepared.repaired {
                log::debug!("Repaired invalid geometry for source {}", source.source_id);
                repaired += 1;
            }

            let Some(rect) = prepared.geometry.bounding_rect() else {
                log::warn!("Source {} has empty geometry; not indexed", source.source_id);
                continue;
            };

            entries.push(IndexedSource {
                source_id: source.source_id.clone(),
                area: source.area,
                geometry: prepared.geometry,
                envelope: rect_envelope(rect),
            });
        }

        log::info!(
            "Indexed {} source regions ({repaired} repaired, {} dropped)",
            entries.len(),
            failures.len()
        );

        Self {
            tree: RTree::bulk_load(entries),
            repaired,
            failures,
        }
    }

    /// Sources whose bounding box intersects `rect`.
    pub fn candidates(&self, rect: Rect<f64>) -> impl Iterator<Item = &IndexedSource> {
        self.tree.locate_in_envelope_intersecting(&rect_envelope(rect))
    }

    pub(crate) fn len(&self) -> usize {
        self.tree.size()
    }

    /// Number of source geometries that failed validation and were rebuilt.
    #[must_use]
    pub const fn repaired(&self) -> usize {
        self.repaired
    }

    /// Sources left out because their geometry could not be prepared.
    #[must_use]
    pub fn failures(&self) -> &[SourceFailure] {
        &self.failures
    }
}

fn rect_envelope(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, Rect};

    use super::*;

    fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Rect::new((min_x, min_y), (max_x, max_y)).to_polygon()])
    }

    #[test]
    fn finds_only_nearby_candidates() {
        let index = SourceIndex::build(&[
            SourceRegion::new("a", rect(0.0, 0.0, 10.0, 10.0)),
            SourceRegion::new("b", rect(10.0, 0.0, 30.0, 10.0)),
            SourceRegion::new("c", rect(100.0, 100.0, 110.0, 110.0)),
        ]);
        assert_eq!(index.len(), 3);

        let mut ids: Vec<&str> = index
            .candidates(Rect::new((5.0, 2.0), (12.0, 4.0)))
            .map(|s| s.source_id.as_str())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn unpreparable_source_is_dropped_and_recorded() {
        let index = SourceIndex::build(&[
            SourceRegion::new("22071000100", rect(0.0, 0.0, 10.0, 10.0)),
            SourceRegion::new("22071000200", rect(f64::NAN, 0.0, 20.0, 10.0)),
        ]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.failures().len(), 1);
        assert_eq!(index.failures()[0].source_id, "22071000200");
    }

    #[test]
    fn drops_empty_geometries() {
        let index = SourceIndex::build(&[
            SourceRegion::new("empty", MultiPolygon::new(Vec::new())),
            SourceRegion::new("a", rect(0.0, 0.0, 1.0, 1.0)),
        ]);
        assert_eq!(index.len(), 1);
    }
}
