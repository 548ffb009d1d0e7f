//! Weights, then aggregation, over one execution context.

use std::{fs, path::PathBuf};

use levee_census_aggregate::{AggregationOutput, AttributeTable, aggregate};
use levee_census_aggregate_models::VariableSpec;
use levee_census_geography_models::{RegionSet, SourceRegion, TargetRegion};
use levee_census_tables::{write_aggregated_csv, write_weight_csv};
use levee_census_weights::{ExecutionContext, WeightOptions, compute_weights};
use levee_census_weights_models::WeightTable;

use crate::{PipelineError, RunSummary};

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub weights: WeightTable,
    pub aggregated: AggregationOutput,
    pub summary: RunSummary,
}

/// Where [`PipelineOutput::write`] puts each artifact.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub table: PathBuf,
    pub weights: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

/// Computes weights for `targets` against `sources`, then aggregates
/// `variables` from `attributes` onto every target.
///
/// # Errors
///
/// Only configuration-level failures abort the run: mismatched or
/// non-equal-area CRSs, or a worker pool that cannot start. Everything
/// else is recorded in the summary.
pub fn run(
    targets: &RegionSet<TargetRegion>,
    sources: &RegionSet<SourceRegion>,
    attributes: &AttributeTable,
    variables: &[VariableSpec],
    ctx: &ExecutionContext,
    options: WeightOptions,
) -> Result<PipelineOutput, PipelineError> {
    let weights = compute_weights(targets, sources, ctx, options)?;

    log::info!(
        "Aggregating {} variable(s) from {} attribute row(s)",
        variables.len(),
        attributes.len()
    );
    let aggregated = aggregate(&weights.records, attributes, &targets.metadata(), variables);
    aggregated.report.log();

    let summary = RunSummary::new(weights.diagnostics.clone(), aggregated.report.clone());

    Ok(PipelineOutput {
        weights,
        aggregated,
        summary,
    })
}

impl PipelineOutput {
    /// Writes the output table and, when requested, the weight table and
    /// the JSON run report.
    ///
    /// # Errors
    ///
    /// Returns an error if any file cannot be written.
    pub fn write(&self, paths: &OutputPaths) -> Result<(), PipelineError> {
        write_aggregated_csv(&paths.table, &self.aggregated.table)?;
        if let Some(path) = &paths.weights {
            write_weight_csv(path, &self.weights.records)?;
        }
        if let Some(path) = &paths.report {
            fs::write(path, self.summary.to_json()?)?;
            log::info!("Wrote run report to {}", path.display());
        }
        Ok(())
    }
}
