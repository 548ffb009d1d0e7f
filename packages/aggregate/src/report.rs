//! Data-quality diagnostics from an aggregation run.
//!
//! Nothing here is fatal. Every count is surfaced in the end-of-run
//! summary so mismatches between the geometry and attribute inputs are
//! visible instead of silently shrinking the output.

use levee_census_aggregate_models::AggregationClass;
use serde::Serialize;

/// A manifest variable that could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedVariable {
    pub name: String,
    /// Declared columns absent from the attribute table.
    pub missing_columns: Vec<String>,
}

/// Per-variable coverage counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableSummary {
    pub name: String,
    pub class: AggregationClass,
    pub targets_with_value: usize,
    /// Targets whose value is null (no contributing source had data).
    pub targets_without_data: usize,
    /// TOTAL variables only: targets where some, but not all, overlapping
    /// sources had an estimate. These values undercount.
    pub targets_with_partial_coverage: usize,
}

/// Mismatches between the weight table, the attribute table and the
/// target metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinMismatch {
    /// Intersecting weight rows dropped because their source id has no
    /// attribute row.
    pub weight_rows_without_attributes: usize,
    /// Distinct source ids behind those dropped rows.
    pub source_ids_without_attributes: Vec<String>,
    /// Attribute rows no weight row refers to. Expected for tracts outside
    /// every leveed area; a count near the table size suggests mismatched
    /// id formats.
    pub attribute_rows_without_weights: usize,
    /// Target ids present in the weight table but absent from the target
    /// metadata; their rows cannot appear in the output.
    pub weight_targets_without_metadata: Vec<String>,
}

impl JoinMismatch {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.weight_rows_without_attributes == 0 && self.weight_targets_without_metadata.is_empty()
    }
}

/// Diagnostics for one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationReport {
    pub targets: usize,
    /// Targets with no joined source row at all; every variable is null.
    pub targets_without_data: usize,
    pub variables: Vec<VariableSummary>,
    pub skipped_variables: Vec<SkippedVariable>,
    pub join: JoinMismatch,
}

impl AggregationReport {
    /// Logs the report: counts at `info`, problems at `warn`.
    pub fn log(&self) {
        log::info!(
            "Aggregated {} variable(s) for {} target(s); {} target(s) with no data",
            self.variables.len(),
            self.targets,
            self.targets_without_data
        );

        for skipped in &self.skipped_variables {
            log::warn!(
                "Skipped variable {}: missing column(s) {}",
                skipped.name,
                skipped.missing_columns.join(", ")
            );
        }

        for summary in &self.variables {
            if summary.targets_with_partial_coverage > 0 {
                log::warn!(
                    "{} ({}): {} target(s) with partial source coverage (values undercount)",
                    summary.name,
                    summary.class,
                    summary.targets_with_partial_coverage
                );
            }
        }

        if self.join.weight_rows_without_attributes > 0 {
            log::warn!(
                "{} weight row(s) dropped: {} source id(s) missing from the attribute table",
                self.join.weight_rows_without_attributes,
                self.join.source_ids_without_attributes.len()
            );
        }
        if !self.join.weight_targets_without_metadata.is_empty() {
            log::warn!(
                "{} target id(s) in the weight table have no metadata row",
                self.join.weight_targets_without_metadata.len()
            );
        }
        log::info!(
            "{} attribute row(s) not referenced by any weight",
            self.join.attribute_rows_without_weights
        );
    }
}
