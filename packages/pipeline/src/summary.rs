//! End-of-run summary.

use std::fmt;

use levee_census_aggregate::AggregationReport;
use levee_census_tables::AttributeReadReport;
use levee_census_weights_models::WeightDiagnostics;
use serde::Serialize;

/// Every diagnostic of a run, printable as text or serialisable as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub weights: WeightDiagnostics,
    pub aggregation: AggregationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_read: Option<AttributeReadReport>,
}

impl RunSummary {
    #[must_use]
    pub const fn new(weights: WeightDiagnostics, aggregation: AggregationReport) -> Self {
        Self {
            weights,
            aggregation,
            attribute_read: None,
        }
    }

    #[must_use]
    pub fn with_attribute_read(mut self, report: AttributeReadReport) -> Self {
        self.attribute_read = Some(report);
        self
    }

    /// `true` when nothing needs a human look: no geometry failures on
    /// either layer, no degenerate weights, no skipped variables and no
    /// join mismatches.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.weights.geometry_failures.is_empty()
            && self.weights.source_failures.is_empty()
            && self.weights.degenerate_weights.is_empty()
            && self.aggregation.skipped_variables.is_empty()
            && self.aggregation.join.is_clean()
    }

    /// Logs the rendered summary, one line per entry.
    pub fn log(&self) {
        let rendered = self.to_string();
        for line in rendered.lines() {
            if self.is_clean() {
                log::info!("{line}");
            } else {
                log::warn!("{line}");
            }
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Only fails if serialisation itself fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = &self.weights;
        let a = &self.aggregation;

        writeln!(f, "Run summary")?;
        writeln!(f, "  targets processed:             {}", w.targets_processed)?;
        writeln!(f, "  targets without intersection:  {}", w.targets_without_intersection)?;
        write!(f, "  geometry failures:             {}", w.geometry_failures.len())?;
        if !w.geometry_failures.is_empty() {
            let ids: Vec<&str> = w.geometry_failures.iter().map(|g| g.target_id.as_str()).collect();
            write!(f, " ({})", ids.join(", "))?;
        }
        writeln!(f)?;
        write!(f, "  sources dropped:               {}", w.source_failures.len())?;
        if !w.source_failures.is_empty() {
            let ids: Vec<&str> = w.source_failures.iter().map(|s| s.source_id.as_str()).collect();
            write!(f, " ({})", ids.join(", "))?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "  repaired geometries:           {} target(s), {} source(s)",
            w.repaired_targets, w.repaired_sources
        )?;
        writeln!(f, "  degenerate weights:            {}", w.degenerate_weights.len())?;

        if let Some(read) = &self.attribute_read {
            writeln!(
                f,
                "  attribute rows read:           {} ({} invalid id(s), {} unparsable cell(s))",
                read.rows, read.invalid_ids, read.unparsable_cells
            )?;
        }

        writeln!(f, "  variables computed:            {}", a.variables.len())?;
        write!(f, "  variables skipped:             {}", a.skipped_variables.len())?;
        if !a.skipped_variables.is_empty() {
            let names: Vec<&str> = a.skipped_variables.iter().map(|s| s.name.as_str()).collect();
            write!(f, " ({})", names.join(", "))?;
        }
        writeln!(f)?;
        writeln!(f, "  targets with no data:          {}", a.targets_without_data)?;
        writeln!(
            f,
            "  weight rows without attributes: {} ({} distinct source id(s))",
            a.join.weight_rows_without_attributes,
            a.join.source_ids_without_attributes.len()
        )?;
        writeln!(
            f,
            "  weight targets without metadata: {}",
            a.join.weight_targets_without_metadata.len()
        )?;
        writeln!(
            f,
            "  attribute rows not referenced: {}",
            a.join.attribute_rows_without_weights
        )?;

        for v in &a.variables {
            write!(
                f,
                "  {} [{}]: {} with value, {} without data",
                v.name, v.class, v.targets_with_value, v.targets_without_data
            )?;
            if v.targets_with_partial_coverage > 0 {
                write!(f, ", {} partial coverage", v.targets_with_partial_coverage)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
