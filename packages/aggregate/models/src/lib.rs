#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Variable manifest and aggregated output types.
//!
//! Every census variable is declared once in a manifest with its
//! [`AggregationClass`]; the class alone decides how the variable is
//! carried from tracts to leveed areas.

use levee_census_geography_models::TargetMetadata;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The ACS "no estimate available" annotation value.
pub const ACS_MISSING_SENTINEL: f64 = -666_666_666.0;

/// How a variable is carried from source to target regions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AggregationClass {
    /// Rates and typical values (median income, median home value):
    /// weighted mean renormalized over sources that have data.
    Average,
    /// Counts (population, housing units): proportional areal
    /// apportionment.
    Total,
}

/// A fully resolved variable declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Logical name; prefixes the variable's output columns.
    pub name: String,
    pub estimate_column: String,
    pub moe_column: String,
    pub class: AggregationClass,
}

impl VariableSpec {
    /// A variable whose columns follow the `<name>` / `<name>_moe` convention.
    #[must_use]
    pub fn new(name: impl Into<String>, class: AggregationClass) -> Self {
        let name = name.into();
        Self {
            estimate_column: name.clone(),
            moe_column: format!("{name}_moe"),
            name,
            class,
        }
    }

    /// Overrides the attribute-table columns read for this variable.
    #[must_use]
    pub fn with_columns(
        mut self,
        estimate_column: impl Into<String>,
        moe_column: impl Into<String>,
    ) -> Self {
        self.estimate_column = estimate_column.into();
        self.moe_column = moe_column.into();
        self
    }

    /// Output column names, in emission order.
    #[must_use]
    pub fn output_columns(&self) -> [String; 5] {
        AggregatedAttribute::COLUMN_SUFFIXES.map(|suffix| format!("{}_{suffix}", self.name))
    }
}

/// One `[[variables]]` entry of a manifest file. Column names are
/// optional and default to the `<name>` / `<name>_moe` convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableEntry {
    pub name: String,
    #[serde(default)]
    pub estimate_column: Option<String>,
    #[serde(default)]
    pub moe_column: Option<String>,
    pub class: AggregationClass,
}

/// Caller-supplied list of variables to aggregate plus ingestion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableManifest {
    /// Raw values meaning "no data", converted to null when the attribute
    /// table is read.
    #[serde(default = "default_sentinels")]
    pub missing_sentinels: Vec<f64>,
    pub variables: Vec<VariableEntry>,
}

fn default_sentinels() -> Vec<f64> {
    vec![ACS_MISSING_SENTINEL]
}

impl VariableManifest {
    /// Resolves every entry into a [`VariableSpec`], in manifest order.
    #[must_use]
    pub fn specs(&self) -> Vec<VariableSpec> {
        self.variables
            .iter()
            .map(|entry| {
                let spec = VariableSpec::new(entry.name.clone(), entry.class);
                let estimate = entry
                    .estimate_column
                    .clone()
                    .unwrap_or_else(|| spec.estimate_column.clone());
                let moe = entry
                    .moe_column
                    .clone()
                    .unwrap_or_else(|| spec.moe_column.clone());
                spec.with_columns(estimate, moe)
            })
            .collect()
    }
}

/// Aggregated estimate of one variable for one target region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedAttribute {
    pub weighted_value: Option<f64>,
    /// 90% margin of error propagated through the weighting.
    pub weighted_moe: Option<f64>,
    /// `(moe / 1.645) / value`; `None` when the value is missing or not
    /// positive.
    pub coefficient_of_variation: Option<f64>,
    /// Contributing source regions with a non-missing estimate.
    pub n_source_regions_with_data: u32,
    /// Sum of the class-appropriate weights over those sources.
    pub total_weight_used: f64,
}

impl AggregatedAttribute {
    /// Suffixes appended to the variable name to form output columns.
    pub const COLUMN_SUFFIXES: [&'static str; 5] = [
        "weighted_value",
        "weighted_moe",
        "CV",
        "n_tracts_with_data",
        "total_weight",
    ];
}

/// One output row: pass-through metadata plus one (possibly null)
/// attribute per aggregated variable.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRow {
    pub metadata: TargetMetadata,
    /// Aligned with [`AggregatedTable::variables`]. `None` means no
    /// source region contributed to this target at all.
    pub attributes: Vec<Option<AggregatedAttribute>>,
}

/// The final per-target table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedTable {
    /// Names of the variables actually computed, in manifest order.
    pub variables: Vec<String>,
    pub rows: Vec<TargetRow>,
}

impl AggregatedTable {
    #[must_use]
    pub fn row(&self, target_id: &str) -> Option<&TargetRow> {
        self.rows.iter().find(|r| r.metadata.target_id == target_id)
    }

    /// The attribute of `variable` for `target_id`, if both exist and the
    /// target received any contribution.
    #[must_use]
    pub fn attribute(&self, target_id: &str, variable: &str) -> Option<&AggregatedAttribute> {
        let column = self.variables.iter().position(|v| v == variable)?;
        self.row(target_id)?.attributes.get(column)?.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn class_names_are_snake_case() {
        assert_eq!(AggregationClass::Average.to_string(), "average");
        assert_eq!(
            AggregationClass::from_str("total").unwrap(),
            AggregationClass::Total
        );
        assert!(AggregationClass::from_str("TOTALS").is_err());
    }

    #[test]
    fn spec_defaults_follow_moe_convention() {
        let spec = VariableSpec::new("median_income", AggregationClass::Average);
        assert_eq!(spec.estimate_column, "median_income");
        assert_eq!(spec.moe_column, "median_income_moe");
        assert_eq!(
            spec.output_columns(),
            [
                "median_income_weighted_value",
                "median_income_weighted_moe",
                "median_income_CV",
                "median_income_n_tracts_with_data",
                "median_income_total_weight",
            ]
            .map(String::from)
        );
    }

    #[test]
    fn manifest_entries_resolve_column_overrides() {
        let manifest = VariableManifest {
            missing_sentinels: default_sentinels(),
            variables: vec![VariableEntry {
                name: "population".to_string(),
                estimate_column: Some("B01003_001E".to_string()),
                moe_column: None,
                class: AggregationClass::Total,
            }],
        };
        let specs = manifest.specs();
        assert_eq!(specs[0].estimate_column, "B01003_001E");
        assert_eq!(specs[0].moe_column, "population_moe");
    }
}
