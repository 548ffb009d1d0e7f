//! Weight application.
//!
//! Joins the weight table against the attribute table, folds each
//! target's joined rows through the variable's aggregation strategy, and
//! left-joins the results onto the target metadata so that every target
//! appears in the output, with nulls where nothing could be computed.

use std::collections::{BTreeMap, BTreeSet};

use levee_census_aggregate_models::{
    AggregatedAttribute, AggregatedTable, AggregationClass, TargetRow, VariableSpec,
};
use levee_census_geography_models::TargetMetadata;
use levee_census_weights_models::WeightRecord;

use crate::attributes::AttributeTable;
use crate::report::{AggregationReport, JoinMismatch, SkippedVariable, VariableSummary};
use crate::strategy::{Contribution, strategy_for};

/// An intersecting weight row whose source has an attribute row.
#[derive(Debug, Clone, Copy)]
struct JoinedRow<'a> {
    source_id: &'a str,
    weight_for_average: Option<f64>,
    weight_for_total: Option<f64>,
}

/// A variable whose columns were found in the attribute table.
struct ResolvedVariable<'a> {
    spec: &'a VariableSpec,
    estimate: usize,
    moe: usize,
}

/// Result of [`aggregate`].
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationOutput {
    pub table: AggregatedTable,
    pub report: AggregationReport,
}

/// Applies weights to source attributes for every declared variable.
///
/// Variables are independent: one with missing columns is skipped and
/// reported while the rest are computed. Targets in `targets` that have
/// no joined source rows are kept with all attributes null.
#[must_use]
pub fn aggregate(
    weights: &[WeightRecord],
    attributes: &AttributeTable,
    targets: &[TargetMetadata],
    variables: &[VariableSpec],
) -> AggregationOutput {
    let mut report = AggregationReport {
        targets: targets.len(),
        ..AggregationReport::default()
    };

    let (joined, join) = join_weights(weights, attributes, targets);
    report.join = join;

    let resolved = resolve_variables(attributes, variables, &mut report.skipped_variables);

    let mut per_variable: Vec<BTreeMap<&str, AggregatedAttribute>> =
        Vec::with_capacity(resolved.len());

    for variable in &resolved {
        let strategy = strategy_for(variable.spec.class);
        let mut results = BTreeMap::new();
        let mut partial = 0;

        for (target_id, rows) in &joined {
            let contributions: Vec<Contribution> = rows
                .iter()
                .map(|row| Contribution {
                    estimate: attributes.value(row.source_id, variable.estimate),
                    moe: attributes.value(row.source_id, variable.moe),
                    weight_for_average: row.weight_for_average,
                    weight_for_total: row.weight_for_total,
                })
                .collect();

            let attribute = strategy.aggregate(&contributions);

            let with_data = attribute.n_source_regions_with_data as usize;
            if variable.spec.class == AggregationClass::Total
                && with_data > 0
                && with_data < contributions.len()
            {
                log::debug!(
                    "{}: target {target_id} has data for {with_data} of {} source(s)",
                    variable.spec.name,
                    contributions.len()
                );
                partial += 1;
            }

            results.insert(*target_id, attribute);
        }

        let targets_with_value = targets
            .iter()
            .filter(|t| {
                results
                    .get(t.target_id.as_str())
                    .is_some_and(|a| a.weighted_value.is_some())
            })
            .count();

        report.variables.push(VariableSummary {
            name: variable.spec.name.clone(),
            class: variable.spec.class,
            targets_with_value,
            targets_without_data: targets.len() - targets_with_value,
            targets_with_partial_coverage: partial,
        });

        per_variable.push(results);
    }

    let mut rows = Vec::with_capacity(targets.len());
    for metadata in targets {
        let id = metadata.target_id.as_str();
        if !joined.contains_key(id) {
            report.targets_without_data += 1;
        }
        rows.push(TargetRow {
            metadata: metadata.clone(),
            attributes: per_variable
                .iter()
                .map(|results| results.get(id).copied())
                .collect(),
        });
    }

    AggregationOutput {
        table: AggregatedTable {
            variables: resolved.iter().map(|v| v.spec.name.clone()).collect(),
            rows,
        },
        report,
    }
}

/// Inner-joins intersecting weight rows with the attribute table, grouped
/// by target. Dropped rows and unreferenced attribute rows are counted.
fn join_weights<'a>(
    weights: &'a [WeightRecord],
    attributes: &AttributeTable,
    targets: &[TargetMetadata],
) -> (BTreeMap<&'a str, Vec<JoinedRow<'a>>>, JoinMismatch) {
    let mut joined: BTreeMap<&str, Vec<JoinedRow<'_>>> = BTreeMap::new();
    let mut missing_sources = BTreeSet::new();
    let mut referenced = BTreeSet::new();
    let mut dropped = 0;

    for record in weights.iter().filter(|r| r.has_intersection) {
        let Some(source_id) = record.source_id.as_deref() else {
            dropped += 1;
            continue;
        };
        if attributes.row(source_id).is_none() {
            dropped += 1;
            missing_sources.insert(source_id);
            continue;
        }
        referenced.insert(source_id);
        joined
            .entry(record.target_id.as_str())
            .or_default()
            .push(JoinedRow {
                source_id,
                weight_for_average: record.weight_for_average,
                weight_for_total: record.weight_for_total,
            });
    }

    let known_targets: BTreeSet<&str> = targets.iter().map(|t| t.target_id.as_str()).collect();
    let unknown_targets: BTreeSet<&str> = weights
        .iter()
        .map(|r| r.target_id.as_str())
        .filter(|id| !known_targets.contains(id))
        .collect();

    let mismatch = JoinMismatch {
        weight_rows_without_attributes: dropped,
        source_ids_without_attributes: missing_sources.into_iter().map(String::from).collect(),
        attribute_rows_without_weights: attributes
            .source_ids()
            .filter(|id| !referenced.contains(id))
            .count(),
        weight_targets_without_metadata: unknown_targets.into_iter().map(String::from).collect(),
    };

    (joined, mismatch)
}

/// Looks up each variable's columns, skipping (and recording) variables
/// with a missing column.
fn resolve_variables<'a>(
    attributes: &AttributeTable,
    variables: &'a [VariableSpec],
    skipped: &mut Vec<SkippedVariable>,
) -> Vec<ResolvedVariable<'a>> {
    let mut resolved = Vec::with_capacity(variables.len());

    for spec in variables {
        let estimate = attributes.column_index(&spec.estimate_column);
        let moe = attributes.column_index(&spec.moe_column);

        match (estimate, moe) {
            (Some(estimate), Some(moe)) => resolved.push(ResolvedVariable {
                spec,
                estimate,
                moe,
            }),
            _ => {
                let missing_columns: Vec<String> = [
                    (estimate, &spec.estimate_column),
                    (moe, &spec.moe_column),
                ]
                .into_iter()
                .filter(|(index, _)| index.is_none())
                .map(|(_, column)| column.clone())
                .collect();

                log::warn!(
                    "Skipping variable {}: column(s) {} not in attribute table",
                    spec.name,
                    missing_columns.join(", ")
                );
                skipped.push(SkippedVariable {
                    name: spec.name.clone(),
                    missing_columns,
                });
            }
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight(target: &str, source: &str, avg: f64, total: f64) -> WeightRecord {
        WeightRecord {
            target_id: target.to_string(),
            source_id: Some(source.to_string()),
            intersection_area: Some(avg),
            source_area: Some(1.0),
            weight_for_average: Some(avg),
            weight_for_total: Some(total),
            has_intersection: true,
        }
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("value should be present");
        assert!(
            (actual - expected).abs() <= 1e-9 * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    fn attributes() -> AttributeTable {
        let mut table = AttributeTable::new(
            ["income", "income_moe", "population", "population_moe"]
                .map(String::from)
                .to_vec(),
        );
        table
            .insert("A", vec![Some(100.0), Some(10.0), Some(500.0), Some(40.0)])
            .unwrap();
        table.insert("B", vec![None, None, None, Some(30.0)]).unwrap();
        table
            .insert("C", vec![Some(1.0), Some(1.0), Some(1.0), Some(1.0)])
            .unwrap();
        table
    }

    fn variables() -> Vec<VariableSpec> {
        vec![
            VariableSpec::new("income", AggregationClass::Average),
            VariableSpec::new("population", AggregationClass::Total),
        ]
    }

    #[test]
    fn average_ignores_tracts_without_data() {
        let weights = vec![weight("T", "A", 0.6, 0.3), weight("T", "B", 0.4, 0.2)];
        let targets = vec![TargetMetadata::new("T")];
        let out = aggregate(&weights, &attributes(), &targets, &variables());

        let income = out.table.attribute("T", "income").unwrap();
        assert_close(income.weighted_value, 100.0);
        assert_close(Some(income.total_weight_used), 0.6);
        assert_eq!(income.n_source_regions_with_data, 1);

        let population = out.table.attribute("T", "population").unwrap();
        assert_close(population.weighted_value, 150.0);
        assert_eq!(out.report.variables[1].targets_with_partial_coverage, 1);
        assert_eq!(out.report.variables[0].targets_with_partial_coverage, 0);
    }

    #[test]
    fn unweightable_targets_are_kept_with_null_attributes() {
        let weights = vec![
            weight("T", "A", 1.0, 1.0),
            WeightRecord::no_intersection("dry"),
        ];
        let targets = vec![TargetMetadata::new("T"), TargetMetadata::new("dry")];
        let out = aggregate(&weights, &attributes(), &targets, &variables());

        assert_eq!(out.table.rows.len(), 2);
        let dry = out.table.row("dry").unwrap();
        assert_eq!(dry.attributes, vec![None, None]);
        assert_eq!(out.report.targets_without_data, 1);
        assert_eq!(out.report.variables[0].targets_without_data, 1);

        let population = out.table.attribute("T", "population").unwrap();
        assert_close(population.weighted_value, 500.0);
    }

    #[test]
    fn missing_attribute_rows_are_dropped_and_counted() {
        let weights = vec![
            weight("T", "A", 0.5, 0.5),
            weight("T", "ZZZ", 0.5, 0.5),
            weight("ghost", "A", 1.0, 0.1),
        ];
        let targets = vec![TargetMetadata::new("T")];
        let out = aggregate(&weights, &attributes(), &targets, &variables());

        assert_eq!(out.report.join.weight_rows_without_attributes, 1);
        assert_eq!(out.report.join.source_ids_without_attributes, vec!["ZZZ"]);
        assert_eq!(out.report.join.attribute_rows_without_weights, 2);
        assert_eq!(out.report.join.weight_targets_without_metadata, vec!["ghost"]);
        assert!(!out.report.join.is_clean());
        assert!(out.table.row("ghost").is_none());

        // The unmatched row is excluded; the average renormalizes over the
        // remaining 0.5 of weight.
        let income = out.table.attribute("T", "income").unwrap();
        assert_close(income.weighted_value, 100.0);
    }

    #[test]
    fn variable_with_missing_column_is_skipped_alone() {
        let mut vars = variables();
        vars.push(
            VariableSpec::new("median_rent", AggregationClass::Average)
                .with_columns("median_rent", "income_moe"),
        );
        let weights = vec![weight("T", "A", 1.0, 1.0)];
        let targets = vec![TargetMetadata::new("T")];
        let out = aggregate(&weights, &attributes(), &targets, &vars);

        assert_eq!(out.table.variables, vec!["income", "population"]);
        assert_eq!(out.report.skipped_variables.len(), 1);
        assert_eq!(
            out.report.skipped_variables[0].missing_columns,
            vec!["median_rent"]
        );
        assert!(out.table.attribute("T", "income").is_some());
    }
}
