#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the levee census toolchain.
//!
//! Uses `indicatif-log-bridge` (via [`levee_census_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and the per-target progress bar never fight for the terminal.

use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use clap::{Args, Parser, Subcommand};
use levee_census_aggregate::aggregate;
use levee_census_cli_utils::{MultiProgress, OverlayBar, Stages};
use levee_census_geography::{
    load::{RegionFields, load_targets},
    projection::GeographicDatum,
};
use levee_census_geography_models::{Crs, TargetMetadata};
use levee_census_pipeline::{
    AttributeInputs, ProjectionChoice, RegionInputs,
    run::{OutputPaths, run},
};
use levee_census_tables::{
    read_target_metadata_csv, read_weight_csv, write_aggregated_csv, write_weight_csv,
};
use levee_census_weights::{
    ExecutionContext, WeightOptions, compute_weights, context::default_workers,
    engine::DEFAULT_DEGENERATE_TOLERANCE,
};
use levee_census_weights_models::WeightDiagnostics;

#[derive(Parser)]
#[command(
    name = "levee_census",
    about = "Areal interpolation of census tract estimates onto leveed areas"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Overlay leveed areas on tracts and write the weight table
    Weights {
        #[command(flatten)]
        regions: RegionArgs,
        #[command(flatten)]
        weighting: WeightArgs,
        /// Weight table CSV to write
        #[arg(long)]
        output: PathBuf,
    },
    /// Apply a previously written weight table to tract attributes
    Aggregate {
        /// Weight table CSV written by `weights`
        #[arg(long)]
        weights: PathBuf,
        /// Leveed-area metadata: a CSV with a `target_id` column, or the
        /// leveed-area `GeoJSON` itself
        #[arg(long)]
        target_metadata: PathBuf,
        /// Property holding the leveed-area id when reading `GeoJSON` metadata
        #[arg(long, default_value = "system_id")]
        target_id_field: String,
        #[command(flatten)]
        attributes: AttributeArgs,
        /// Output CSV, one row per leveed area
        #[arg(long)]
        output: PathBuf,
    },
    /// Weights and aggregation in one pass
    Run {
        #[command(flatten)]
        regions: RegionArgs,
        #[command(flatten)]
        weighting: WeightArgs,
        #[command(flatten)]
        attributes: AttributeArgs,
        /// Output CSV, one row per leveed area
        #[arg(long)]
        output: PathBuf,
        /// Also write the weight table here
        #[arg(long)]
        weights_output: Option<PathBuf>,
        /// Also write the run summary as JSON here
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RegionArgs {
    /// Leveed-area `GeoJSON` `FeatureCollection`
    #[arg(long)]
    targets: PathBuf,
    /// Census tract `GeoJSON` `FeatureCollection`
    #[arg(long)]
    sources: PathBuf,
    /// Equal-area projection: auto, conus, alaska, hawaii, fitted, or
    /// prepared (inputs already projected)
    #[arg(long, default_value = "auto")]
    projection: ProjectionChoice,
    /// CRS id declared for already-projected inputs (`--projection prepared`)
    #[arg(long, default_value = "EPSG:5070")]
    crs: String,
    /// Input coordinates are WGS84 rather than NAD83
    #[arg(long)]
    wgs84: bool,
    /// Property holding the leveed-area id
    #[arg(long, default_value = "system_id")]
    target_id_field: String,
    /// Property holding the tract GEOID
    #[arg(long, default_value = "GEOID")]
    source_id_field: String,
    /// Keep tract ids as-is instead of validating them as 11-digit GEOIDs
    #[arg(long)]
    raw_source_ids: bool,
}

impl RegionArgs {
    fn inputs(&self) -> RegionInputs {
        let mut inputs = RegionInputs::new(&self.targets, &self.sources);
        inputs.target_fields.id.clone_from(&self.target_id_field);
        inputs.source_fields.id.clone_from(&self.source_id_field);
        inputs.normalize_tract_ids = !self.raw_source_ids;
        inputs.projection = self.projection;
        inputs.prepared_crs.clone_from(&self.crs);
        inputs.datum = if self.wgs84 {
            GeographicDatum::Wgs84
        } else {
            GeographicDatum::Nad83
        };
        inputs
    }
}

#[derive(Args)]
struct WeightArgs {
    /// Worker threads for the overlay (default: available cores minus one)
    #[arg(long)]
    workers: Option<usize>,
    /// Tolerance before a `weight_for_total` outside [0, 1] is reported
    #[arg(long, default_value_t = DEFAULT_DEGENERATE_TOLERANCE)]
    tolerance: f64,
}

impl WeightArgs {
    fn context(
        &self,
        multi: &MultiProgress,
    ) -> Result<ExecutionContext, Box<dyn std::error::Error>> {
        Ok(ExecutionContext::new(
            self.workers.unwrap_or_else(default_workers),
            OverlayBar::attach(multi),
        )?)
    }

    const fn options(&self) -> WeightOptions {
        WeightOptions {
            degenerate_tolerance: self.tolerance,
        }
    }
}

#[derive(Args)]
struct AttributeArgs {
    /// Tract attribute CSV with paired `<var>` / `<var>_moe` columns
    #[arg(long)]
    attributes: PathBuf,
    /// Variable manifest TOML (default: the built-in ACS manifest)
    #[arg(long)]
    manifest: Option<PathBuf>,
    /// Name of the tract id column in the attribute CSV
    #[arg(long, default_value = "source_id")]
    id_column: String,
    /// Keep attribute ids as-is instead of validating them as GEOIDs
    #[arg(long)]
    raw_attribute_ids: bool,
}

impl AttributeArgs {
    fn inputs(&self) -> AttributeInputs {
        let mut inputs = AttributeInputs::new(&self.attributes);
        inputs.manifest.clone_from(&self.manifest);
        inputs.id_column.clone_from(&self.id_column);
        inputs.normalize_tract_ids = !self.raw_attribute_ids;
        inputs
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = levee_census_cli_utils::init_logger();
    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Weights {
            regions,
            weighting,
            output,
        } => {
            let loaded = regions.inputs().load()?;
            let ctx = weighting.context(&multi)?;
            let table = compute_weights(
                &loaded.targets,
                &loaded.sources,
                &ctx,
                weighting.options(),
            )?;
            ctx.finish(&format!("{} leveed areas overlaid", loaded.targets.len()));

            write_weight_csv(&output, &table.records)?;
            log_weight_diagnostics(&table.diagnostics);
        }
        Commands::Aggregate {
            weights,
            target_metadata,
            target_id_field,
            attributes,
            output,
        } => {
            let records = read_weight_csv(&weights)?;
            let targets = read_metadata(&target_metadata, &target_id_field)?;
            let loaded = attributes.inputs().load()?;

            let out = aggregate(&records, &loaded.table, &targets, &loaded.variables);
            out.report.log();
            write_aggregated_csv(&output, &out.table)?;
        }
        Commands::Run {
            regions,
            weighting,
            attributes,
            output,
            weights_output,
            report,
        } => {
            let stages =
                Stages::attach(&multi, &["loading inputs", "weighting", "writing outputs"]);

            let loaded_regions = regions.inputs().load()?;
            let loaded_attributes = attributes.inputs().load()?;
            stages.advance();

            let ctx = weighting.context(&multi)?;
            let mut out = run(
                &loaded_regions.targets,
                &loaded_regions.sources,
                &loaded_attributes.table,
                &loaded_attributes.variables,
                &ctx,
                weighting.options(),
            )?;
            ctx.finish(&format!(
                "{} leveed areas overlaid",
                loaded_regions.targets.len()
            ));
            out.summary = out
                .summary
                .with_attribute_read(loaded_attributes.read_report);
            stages.advance();

            out.write(&OutputPaths {
                table: output,
                weights: weights_output,
                report,
            })?;
            stages.advance();

            out.summary.log();
        }
    }

    log::info!("Finished in {:.1}s", start.elapsed().as_secs_f64());

    Ok(())
}

/// Metadata from a CSV, or from the properties of a `GeoJSON` layer.
fn read_metadata(
    path: &Path,
    id_field: &str,
) -> Result<Vec<TargetMetadata>, Box<dyn std::error::Error>> {
    let is_geojson = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("geojson") || e.eq_ignore_ascii_case("json"));

    if !is_geojson {
        return Ok(read_target_metadata_csv(path)?);
    }

    let mut fields = RegionFields::leveed_areas();
    fields.id = id_field.to_string();
    let (targets, _) = load_targets(&std::fs::read_to_string(path)?, &fields, Crs::nad83())?;
    Ok(targets.metadata())
}

fn log_weight_diagnostics(diagnostics: &WeightDiagnostics) {
    log::info!(
        "{} target(s) processed, {} without intersection, {} repaired target(s), {} repaired source(s)",
        diagnostics.targets_processed,
        diagnostics.targets_without_intersection,
        diagnostics.repaired_targets,
        diagnostics.repaired_sources
    );
    for failure in &diagnostics.geometry_failures {
        log::warn!("Geometry failure in {}: {}", failure.target_id, failure.message);
    }
    for failure in &diagnostics.source_failures {
        log::warn!("Dropped source {}: {}", failure.source_id, failure.message);
    }
    if !diagnostics.degenerate_weights.is_empty() {
        log::error!(
            "{} degenerate weight(s); check that both layers share an equal-area projection",
            diagnostics.degenerate_weights.len()
        );
    }
}
