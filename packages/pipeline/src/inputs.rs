//! File inputs of a run: the two polygon layers, the attribute table and
//! the variable manifest.

use std::{collections::BTreeSet, fs, path::PathBuf};

use levee_census_aggregate::{AttributeTable, default_manifest, parse_manifest_toml};
use levee_census_aggregate_models::VariableSpec;
use levee_census_geography::{
    load::{LoadReport, RegionFields, load_sources, load_targets},
    projection::{EqualAreaProjection, GeographicDatum, geographic_bounds},
};
use levee_census_geography_models::{Crs, RegionSet, SourceRegion, TargetRegion, TractId};
use levee_census_tables::{AttributeReadOptions, AttributeReadReport, read_attribute_csv};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::PipelineError;

/// Which equal-area CRS the regions are projected into before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ProjectionChoice {
    /// Alaska or Hawaii Albers when the tracts are in those states,
    /// CONUS Albers otherwise.
    #[default]
    Auto,
    Conus,
    Alaska,
    Hawaii,
    /// Albers fitted to the leveed areas' extent.
    Fitted,
    /// Inputs are already in an equal-area CRS and are used as-is.
    Prepared,
}

/// Paths and field mappings of the two polygon layers.
#[derive(Debug, Clone)]
pub struct RegionInputs {
    pub targets: PathBuf,
    pub sources: PathBuf,
    pub target_fields: RegionFields,
    pub source_fields: RegionFields,
    pub normalize_tract_ids: bool,
    pub projection: ProjectionChoice,
    pub datum: GeographicDatum,
    /// CRS id declared for both layers when `projection` is
    /// [`ProjectionChoice::Prepared`].
    pub prepared_crs: String,
}

/// Both layers, projected into the same equal-area CRS.
#[derive(Debug, Clone)]
pub struct LoadedRegions {
    pub targets: RegionSet<TargetRegion>,
    pub sources: RegionSet<SourceRegion>,
    pub target_report: LoadReport,
    pub source_report: LoadReport,
}

impl RegionInputs {
    /// Tract and levee-inventory defaults for everything but the paths.
    #[must_use]
    pub fn new(targets: impl Into<PathBuf>, sources: impl Into<PathBuf>) -> Self {
        Self {
            targets: targets.into(),
            sources: sources.into(),
            target_fields: RegionFields::leveed_areas(),
            source_fields: RegionFields::tracts(),
            normalize_tract_ids: true,
            projection: ProjectionChoice::default(),
            datum: GeographicDatum::default(),
            prepared_crs: "EPSG:5070".to_string(),
        }
    }

    /// Reads both `GeoJSON` files and projects them.
    ///
    /// # Errors
    ///
    /// * Either file cannot be read or parsed
    /// * A projection must be chosen from a layer that loaded no regions
    /// * Any geometry fails to project
    pub fn load(&self) -> Result<LoadedRegions, PipelineError> {
        let declared = if self.projection == ProjectionChoice::Prepared {
            Crs::equal_area(self.prepared_crs.clone())
        } else {
            match self.datum {
                GeographicDatum::Nad83 => Crs::nad83(),
                GeographicDatum::Wgs84 => Crs::wgs84(),
            }
        };

        log::info!("Loading leveed areas from {}", self.targets.display());
        let (targets, target_report) = load_targets(
            &fs::read_to_string(&self.targets)?,
            &self.target_fields,
            declared.clone(),
        )?;

        log::info!("Loading tracts from {}", self.sources.display());
        let (sources, source_report) = load_sources(
            &fs::read_to_string(&self.sources)?,
            &self.source_fields,
            declared,
            self.normalize_tract_ids,
        )?;

        let (targets, sources) = match self.resolve_projection(&targets, &sources)? {
            Some(projection) => {
                log::info!("Projecting both layers into {}", projection.crs().id);
                (
                    projection.project_targets(targets, self.datum)?,
                    projection.project_sources(sources, self.datum)?,
                )
            }
            None => (targets, sources),
        };

        Ok(LoadedRegions {
            targets,
            sources,
            target_report,
            source_report,
        })
    }

    fn resolve_projection(
        &self,
        targets: &RegionSet<TargetRegion>,
        sources: &RegionSet<SourceRegion>,
    ) -> Result<Option<EqualAreaProjection>, PipelineError> {
        Ok(Some(match self.projection {
            ProjectionChoice::Prepared => return Ok(None),
            ProjectionChoice::Conus => EqualAreaProjection::conus(),
            ProjectionChoice::Alaska => EqualAreaProjection::alaska(),
            ProjectionChoice::Hawaii => EqualAreaProjection::hawaii(),
            ProjectionChoice::Fitted => {
                let bounds = geographic_bounds(targets.regions.iter().map(|t| &t.geometry))
                    .ok_or(PipelineError::NoRegions { layer: "target" })?;
                EqualAreaProjection::fitted(bounds)
            }
            ProjectionChoice::Auto => {
                if sources.is_empty() {
                    return Err(PipelineError::NoRegions { layer: "source" });
                }
                let states: BTreeSet<String> = sources
                    .regions
                    .iter()
                    .filter_map(|s| TractId::parse(&s.source_id).ok())
                    .map(|id| id.state_fips().to_string())
                    .collect();
                match states.len() {
                    0 => EqualAreaProjection::conus(),
                    1 => EqualAreaProjection::for_state_fips(
                        states.first().map_or("", String::as_str),
                    ),
                    _ => {
                        if states.contains("02") || states.contains("15") {
                            log::warn!(
                                "Tracts span states {states:?} including Alaska or Hawaii; \
                                 using CONUS Albers. Run those states separately."
                            );
                        }
                        EqualAreaProjection::conus()
                    }
                }
            }
        }))
    }
}

/// Attribute CSV plus the manifest describing its variables.
#[derive(Debug, Clone)]
pub struct AttributeInputs {
    pub attributes: PathBuf,
    /// `None` uses the embedded ACS manifest.
    pub manifest: Option<PathBuf>,
    pub id_column: String,
    pub normalize_tract_ids: bool,
}

/// The attribute table and resolved variables.
#[derive(Debug, Clone)]
pub struct LoadedAttributes {
    pub table: AttributeTable,
    pub variables: Vec<VariableSpec>,
    pub read_report: AttributeReadReport,
}

impl AttributeInputs {
    #[must_use]
    pub fn new(attributes: impl Into<PathBuf>) -> Self {
        let defaults = AttributeReadOptions::default();
        Self {
            attributes: attributes.into(),
            manifest: None,
            id_column: defaults.id_column,
            normalize_tract_ids: defaults.normalize_tract_ids,
        }
    }

    /// Reads the manifest, then the attribute table with the manifest's
    /// missing-value sentinels.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be read or parsed.
    pub fn load(&self) -> Result<LoadedAttributes, PipelineError> {
        let manifest = match &self.manifest {
            Some(path) => {
                log::info!("Reading variable manifest {}", path.display());
                parse_manifest_toml(&fs::read_to_string(path)?)?
            }
            None => default_manifest()?,
        };

        let options = AttributeReadOptions::default()
            .with_id_column(self.id_column.clone())
            .with_sentinels(manifest.missing_sentinels.clone())
            .with_tract_ids(self.normalize_tract_ids);

        let (table, read_report) = read_attribute_csv(&self.attributes, &options)?;

        Ok(LoadedAttributes {
            table,
            variables: manifest.specs(),
            read_report,
        })
    }
}
