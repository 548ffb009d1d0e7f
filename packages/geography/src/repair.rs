//! Geometry validation and repair.
//!
//! Upstream layers are usually cleaned already, but projection can move
//! vertices enough to reintroduce self-intersections. Every geometry is
//! re-validated immediately before it is intersected.

use geo::{BooleanOps, MultiPolygon, Validation};

/// Outcome of [`validate_or_repair`].
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub geometry: MultiPolygon<f64>,
    /// The input failed validation and was rebuilt.
    pub repaired: bool,
}

/// Validates `geometry`, rebuilding it through a boolean union when it is
/// invalid.
///
/// The union resolves self-intersecting rings and normalizes ring
/// orientation. The input is left untouched when it is already valid.
#[must_use]
pub fn validate_or_repair(geometry: &MultiPolygon<f64>) -> Prepared {
    if geometry.is_valid() {
        return Prepared {
            geometry: geometry.clone(),
            repaired: false,
        };
    }

    let rebuilt = geometry.union(&MultiPolygon::new(Vec::new()));
    if !rebuilt.is_valid() {
        log::warn!(
            "Geometry with {} part(s) is still invalid after repair",
            rebuilt.0.len()
        );
    }

    Prepared {
        geometry: rebuilt,
        repaired: true,
    }
}

#[cfg(test)]
mod tests {
    use geo::{Area, LineString, MultiPolygon, Polygon, Rect};

    use super::*;

    #[test]
    fn valid_geometry_passes_through() {
        let square = MultiPolygon(vec![Rect::new((0.0, 0.0), (4.0, 4.0)).to_polygon()]);
        let prepared = validate_or_repair(&square);
        assert!(!prepared.repaired);
        assert_eq!(prepared.geometry, square);
    }

    #[test]
    fn bowtie_is_rebuilt_with_its_full_area() {
        let bowtie = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0), (0.0, 0.0)]),
            vec![],
        )]);
        assert!(!bowtie.is_valid());

        let prepared = validate_or_repair(&bowtie);
        assert!(prepared.repaired);
        assert!((prepared.geometry.unsigned_area() - 2.0).abs() < 1e-6);
    }
}
