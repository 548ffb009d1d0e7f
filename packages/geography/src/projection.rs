//! Albers equal-area projections for overlay weighting.
//!
//! Intersection areas are only comparable to tract areas when both are
//! measured in a projection that preserves area. Geographic coordinates
//! (degrees) and conformal projections (UTM, Web Mercator) distort area
//! ratios, so every region set is projected into one of the Albers
//! definitions below before weights are computed.

use geo::{BoundingRect, Coord, MapCoords, MultiPolygon, Rect};
use levee_census_geography_models::{Crs, CrsKind, RegionSet, SourceRegion, TargetRegion};
use proj4rs::{proj::Proj, transform::transform};

use crate::GeographyError;

/// Datum of the longitude/latitude input coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeographicDatum {
    /// TIGER/Line and most federal GIS layers.
    #[default]
    Nad83,
    Wgs84,
}

impl GeographicDatum {
    const fn proj4(self) -> &'static str {
        match self {
            Self::Nad83 => "+proj=longlat +datum=NAD83 +no_defs +type=crs",
            Self::Wgs84 => "+proj=longlat +datum=WGS84 +no_defs +type=crs",
        }
    }
}

/// An Albers equal-area conic projection and the CRS it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualAreaProjection {
    crs: Crs,
    proj4: String,
}

impl EqualAreaProjection {
    /// NAD83 / Conus Albers (EPSG:5070), the default for the lower 48.
    #[must_use]
    pub fn conus() -> Self {
        Self {
            crs: Crs::equal_area("EPSG:5070"),
            proj4: albers(23.0, -96.0, 29.5, 45.5),
        }
    }

    /// NAD83 / Alaska Albers (EPSG:3338).
    #[must_use]
    pub fn alaska() -> Self {
        Self {
            crs: Crs::equal_area("EPSG:3338"),
            proj4: albers(50.0, -154.0, 55.0, 65.0),
        }
    }

    /// Hawaii Albers Equal Area Conic (ESRI:102007).
    #[must_use]
    pub fn hawaii() -> Self {
        Self {
            crs: Crs::equal_area("ESRI:102007"),
            proj4: albers(13.0, -157.0, 8.0, 18.0),
        }
    }

    /// Picks the standard Albers definition covering a state.
    #[must_use]
    pub fn for_state_fips(fips: &str) -> Self {
        match fips {
            "02" => Self::alaska(),
            "15" => Self::hawaii(),
            _ => Self::conus(),
        }
    }

    /// An Albers projection fitted to a lon/lat bounding box.
    ///
    /// Standard parallels sit at 1/6 and 5/6 of the latitude span, the
    /// usual rule for minimizing scale error over a region.
    #[must_use]
    pub fn fitted(bounds: Rect<f64>) -> Self {
        let lat_span = bounds.max().y - bounds.min().y;
        let lat_1 = bounds.min().y + lat_span / 6.0;
        let lat_2 = bounds.max().y - lat_span / 6.0;
        let center = bounds.center();
        let proj4 = albers(center.y, center.x, lat_1, lat_2);

        Self {
            crs: Crs::equal_area(format!(
                "AEA:lat_0={:.4},lon_0={:.4},lat_1={lat_1:.4},lat_2={lat_2:.4}",
                center.y, center.x
            )),
            proj4,
        }
    }

    /// The CRS geometries end up in after [`Self::project`].
    #[must_use]
    pub const fn crs(&self) -> &Crs {
        &self.crs
    }

    /// The PROJ.4 definition of the projection.
    #[must_use]
    pub fn proj4(&self) -> &str {
        &self.proj4
    }

    /// Projects one lon/lat (degrees) geometry into metres.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError::Projection`] if either PROJ.4 definition
    /// is rejected or any coordinate fails to transform.
    pub fn project(
        &self,
        geometry: &MultiPolygon<f64>,
        datum: GeographicDatum,
    ) -> Result<MultiPolygon<f64>, GeographyError> {
        let (from, to) = self.build(datum)?;
        project_with(&from, &to, geometry)
    }

    /// Projects every source region and recomputes its cached area in the
    /// projected units.
    ///
    /// # Errors
    ///
    /// Returns an error if the set is not geographic or any geometry fails
    /// to project.
    pub fn project_sources(
        &self,
        sources: RegionSet<SourceRegion>,
        datum: GeographicDatum,
    ) -> Result<RegionSet<SourceRegion>, GeographyError> {
        require_geographic(&sources.crs)?;
        let (from, to) = self.build(datum)?;

        let regions = sources
            .regions
            .into_iter()
            .map(|s| Ok(SourceRegion::new(s.source_id, project_with(&from, &to, &s.geometry)?)))
            .collect::<Result<Vec<_>, GeographyError>>()?;

        log::debug!("Projected {} source regions into {}", regions.len(), self.crs.id);

        Ok(RegionSet::new(self.crs.clone(), regions))
    }

    /// Projects every target region, keeping its metadata untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the set is not geographic or any geometry fails
    /// to project.
    pub fn project_targets(
        &self,
        targets: RegionSet<TargetRegion>,
        datum: GeographicDatum,
    ) -> Result<RegionSet<TargetRegion>, GeographyError> {
        require_geographic(&targets.crs)?;
        let (from, to) = self.build(datum)?;

        let regions = targets
            .regions
            .into_iter()
            .map(|t| {
                let geometry = project_with(&from, &to, &t.geometry)?;
                Ok(TargetRegion::new(t.metadata, geometry))
            })
            .collect::<Result<Vec<_>, GeographyError>>()?;

        log::debug!("Projected {} target regions into {}", regions.len(), self.crs.id);

        Ok(RegionSet::new(self.crs.clone(), regions))
    }

    fn build(&self, datum: GeographicDatum) -> Result<(Proj, Proj), GeographyError> {
        let from = Proj::from_proj_string(datum.proj4()).map_err(|e| GeographyError::Projection {
            message: format!("failed to build source PROJ.4 {}: {e:?}", datum.proj4()),
        })?;
        let to = Proj::from_proj_string(&self.proj4).map_err(|e| GeographyError::Projection {
            message: format!("failed to build target PROJ.4 {}: {e:?}", self.proj4),
        })?;
        Ok((from, to))
    }
}

/// Lon/lat bounding box of a set of geographic regions, used to fit a
/// projection to the study area.
#[must_use]
pub fn geographic_bounds<'a>(
    geometries: impl IntoIterator<Item = &'a MultiPolygon<f64>>,
) -> Option<Rect<f64>> {
    geometries
        .into_iter()
        .filter_map(BoundingRect::bounding_rect)
        .reduce(|a, b| {
            Rect::new(
                Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                },
            )
        })
}

fn albers(lat_0: f64, lon_0: f64, lat_1: f64, lat_2: f64) -> String {
    format!(
        "+proj=aea +lat_0={lat_0} +lon_0={lon_0} +lat_1={lat_1} +lat_2={lat_2} \
         +x_0=0 +y_0=0 +datum=NAD83 +units=m +no_defs +type=crs"
    )
}

fn require_geographic(crs: &Crs) -> Result<(), GeographyError> {
    if crs.kind == CrsKind::Geographic {
        Ok(())
    } else {
        Err(GeographyError::NotGeographic {
            crs: crs.id.clone(),
        })
    }
}

fn project_with(
    from: &Proj,
    to: &Proj,
    geometry: &MultiPolygon<f64>,
) -> Result<MultiPolygon<f64>, GeographyError> {
    geometry.try_map_coords(|coord: Coord<f64>| {
        // Degrees in, radians to proj4rs, metres out.
        let mut point = (coord.x.to_radians(), coord.y.to_radians(), 0.0);
        transform(from, to, &mut point).map_err(|e| GeographyError::Projection {
            message: format!("failed to project ({}, {}): {e:?}", coord.x, coord.y),
        })?;
        Ok(Coord {
            x: point.0,
            y: point.1,
        })
    })
}

#[cfg(test)]
mod tests {
    use geo::{Area, MultiPolygon, Rect};

    use super::*;

    fn degree_box(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Rect::new((min_x, min_y), (max_x, max_y)).to_polygon()])
    }

    #[test]
    fn picks_state_specific_albers() {
        assert_eq!(EqualAreaProjection::for_state_fips("02").crs().id, "EPSG:3338");
        assert_eq!(EqualAreaProjection::for_state_fips("15").crs().id, "ESRI:102007");
        assert_eq!(EqualAreaProjection::for_state_fips("22").crs().id, "EPSG:5070");
        assert!(EqualAreaProjection::conus().crs().is_equal_area());
    }

    #[test]
    fn fitted_parallels_sit_inside_the_bounds() {
        let bounds = Rect::new((-94.0, 29.0), (-89.0, 35.0));
        let projection = EqualAreaProjection::fitted(bounds);
        assert!(projection.proj4().contains("+lat_1=30"));
        assert!(projection.proj4().contains("+lat_2=34"));
        assert!(projection.crs().is_equal_area());
    }

    #[test]
    fn projected_areas_preserve_ratios() {
        let projection = EqualAreaProjection::conus();
        let small = projection
            .project(&degree_box(-91.0, 30.0, -90.9, 30.1), GeographicDatum::Nad83)
            .unwrap();
        let large = projection
            .project(&degree_box(-91.0, 30.0, -90.8, 30.1), GeographicDatum::Nad83)
            .unwrap();

        // A 0.1° square near 30°N is roughly 9.6 km x 11.1 km.
        let small_km2 = small.unsigned_area() / 1.0e6;
        assert!(small_km2 > 90.0 && small_km2 < 125.0, "{small_km2}");

        let ratio = large.unsigned_area() / small.unsigned_area();
        assert!((ratio - 2.0).abs() < 1e-3, "{ratio}");
    }

    #[test]
    fn refuses_to_project_already_projected_sets() {
        let projection = EqualAreaProjection::conus();
        let sources = RegionSet::new(
            Crs::equal_area("EPSG:5070"),
            vec![SourceRegion::new("22071001700", degree_box(0.0, 0.0, 1.0, 1.0))],
        );
        let err = projection
            .project_sources(sources, GeographicDatum::Nad83)
            .unwrap_err();
        assert!(matches!(err, GeographyError::NotGeographic { .. }));
    }

    #[test]
    fn bounds_cover_every_geometry() {
        let a = degree_box(-91.0, 30.0, -90.0, 31.0);
        let b = degree_box(-92.5, 29.5, -91.5, 30.5);
        let rect = geographic_bounds([&a, &b]).unwrap();
        assert!((rect.min().x - -92.5).abs() < 1e-12);
        assert!((rect.min().y - 29.5).abs() < 1e-12);
        assert!((rect.max().x - -90.0).abs() < 1e-12);
        assert!((rect.max().y - 31.0).abs() < 1e-12);
    }
}
