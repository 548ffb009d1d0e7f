//! `GeoJSON` `FeatureCollection` → region conversion.
//!
//! Field names differ between the tract layer and the levee inventory, so
//! each load is driven by a [`RegionFields`] mapping. Features without an
//! id or with non-areal geometry are skipped and counted rather than
//! failing the whole load.

use std::collections::HashMap;

use geo::{BooleanOps, MultiPolygon};
use geojson::{Feature, GeoJson};
use levee_census_geography_models::{
    Crs, RegionSet, SourceRegion, TargetMetadata, TargetRegion, TractId,
};

use crate::GeographyError;

/// Which feature properties hold each region field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionFields {
    pub id: String,
    pub name: Option<String>,
    pub accreditation: Option<String>,
    pub area: Option<String>,
    pub length: Option<String>,
}

impl RegionFields {
    /// TIGER/Line census tract layer.
    #[must_use]
    pub fn tracts() -> Self {
        Self {
            id: "GEOID".to_string(),
            name: None,
            accreditation: None,
            area: None,
            length: None,
        }
    }

    /// National Levee Database leveed-area layer.
    #[must_use]
    pub fn leveed_areas() -> Self {
        Self {
            id: "system_id".to_string(),
            name: Some("name".to_string()),
            accreditation: Some("fema_accreditation".to_string()),
            area: Some("area_sq_mi".to_string()),
            length: Some("length_mi".to_string()),
        }
    }
}

/// Counts of features kept and skipped during a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub missing_id: usize,
    pub non_areal_geometry: usize,
    pub invalid_tract_id: usize,
    /// Features folded into an earlier feature with the same source id.
    pub merged_duplicates: usize,
}

impl LoadReport {
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.missing_id + self.non_areal_geometry + self.invalid_tract_id
    }
}

/// Parses a `GeoJSON` document that must be a `FeatureCollection`.
///
/// # Errors
///
/// Returns an error if the document is not valid `GeoJSON` or is a bare
/// geometry/feature instead of a collection.
pub fn parse_features(geojson_str: &str) -> Result<Vec<Feature>, GeographyError> {
    match geojson_str.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => Ok(collection.features),
        GeoJson::Feature(_) => Err(GeographyError::NotFeatureCollection { found: "Feature" }),
        GeoJson::Geometry(_) => Err(GeographyError::NotFeatureCollection { found: "Geometry" }),
    }
}

/// Loads source regions (tracts), caching each polygon's area in the
/// units of `crs`.
///
/// When `normalize_tract_ids` is set, ids are validated and zero-padded as
/// 11-digit tract GEOIDs; features whose id cannot be parsed are skipped.
///
/// Source ids are unique in the result. Features sharing an id (a tract
/// split across several features) are dissolved into one region at the
/// position of the first, and its area is computed once from the merged
/// geometry.
///
/// # Errors
///
/// Returns an error if the document cannot be parsed.
pub fn load_sources(
    geojson_str: &str,
    fields: &RegionFields,
    crs: Crs,
    normalize_tract_ids: bool,
) -> Result<(RegionSet<SourceRegion>, LoadReport), GeographyError> {
    let features = parse_features(geojson_str)?;
    let mut report = LoadReport::default();
    let mut parts: Vec<(String, Vec<MultiPolygon<f64>>)> = Vec::with_capacity(features.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for feature in &features {
        let Some(raw_id) = property_string(feature, &fields.id) else {
            report.missing_id += 1;
            continue;
        };

        let source_id = if normalize_tract_ids {
            match TractId::parse(&raw_id) {
                Ok(id) => id.to_string(),
                Err(e) => {
                    log::warn!("Skipping source feature: {e}");
                    report.invalid_tract_id += 1;
                    continue;
                }
            }
        } else {
            raw_id
        };

        let Some(geometry) = feature_multipolygon(feature) else {
            log::warn!("Skipping source {source_id}: geometry is missing or not areal");
            report.non_areal_geometry += 1;
            continue;
        };

        if let Some(&position) = positions.get(&source_id) {
            parts[position].1.push(geometry);
            report.merged_duplicates += 1;
            continue;
        }

        positions.insert(source_id.clone(), parts.len());
        parts.push((source_id, vec![geometry]));
    }

    let regions: Vec<SourceRegion> = parts
        .into_iter()
        .map(|(source_id, mut pieces)| {
            if pieces.len() == 1 {
                return SourceRegion::new(source_id, pieces.remove(0));
            }
            log::warn!(
                "Source {source_id} appears in {} features; dissolving them into one",
                pieces.len()
            );
            SourceRegion::new(source_id, dissolve(&pieces))
        })
        .collect();

    report.loaded = regions.len();
    log::info!(
        "Loaded {} source regions ({} skipped, {} duplicate feature(s) merged)",
        report.loaded,
        report.skipped(),
        report.merged_duplicates
    );

    Ok((RegionSet::new(crs, regions), report))
}

/// Unions the pieces one at a time, so overlapping pieces are counted
/// once in the area.
fn dissolve(pieces: &[MultiPolygon<f64>]) -> MultiPolygon<f64> {
    pieces
        .iter()
        .fold(MultiPolygon::new(Vec::new()), |merged, piece| merged.union(piece))
}

/// Loads target regions (leveed areas) with their pass-through metadata.
///
/// # Errors
///
/// Returns an error if the document cannot be parsed.
pub fn load_targets(
    geojson_str: &str,
    fields: &RegionFields,
    crs: Crs,
) -> Result<(RegionSet<TargetRegion>, LoadReport), GeographyError> {
    let features = parse_features(geojson_str)?;
    let mut report = LoadReport::default();
    let mut regions = Vec::with_capacity(features.len());

    for feature in &features {
        let Some(target_id) = property_string(feature, &fields.id) else {
            report.missing_id += 1;
            continue;
        };

        let Some(geometry) = feature_multipolygon(feature) else {
            log::warn!("Skipping target {target_id}: geometry is missing or not areal");
            report.non_areal_geometry += 1;
            continue;
        };

        let metadata = TargetMetadata {
            target_id,
            name: fields
                .name
                .as_deref()
                .and_then(|key| property_string(feature, key)),
            accreditation: fields
                .accreditation
                .as_deref()
                .and_then(|key| property_string(feature, key)),
            area: fields
                .area
                .as_deref()
                .and_then(|key| property_f64(feature, key)),
            length: fields
                .length
                .as_deref()
                .and_then(|key| property_f64(feature, key)),
        };

        regions.push(TargetRegion::new(metadata, geometry));
    }

    report.loaded = regions.len();
    log::info!(
        "Loaded {} target regions ({} skipped)",
        report.loaded,
        report.skipped()
    );

    Ok((RegionSet::new(crs, regions), report))
}

/// Converts a feature's geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn feature_multipolygon(feature: &Feature) -> Option<MultiPolygon<f64>> {
    let geometry = feature.geometry.clone()?;
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

fn property_string(feature: &Feature, key: &str) -> Option<String> {
    let value = feature.property(key)?;
    let text = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map_or_else(|| n.to_string(), |i| i.to_string()),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn property_f64(feature: &Feature, key: &str) -> Option<f64> {
    match feature.property(key)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
