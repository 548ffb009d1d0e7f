//! Aggregation strategies, one per [`AggregationClass`].
//!
//! Adding a variable never touches this module: its class picks the
//! strategy through [`strategy_for`], and the compiler checks the match is
//! exhaustive.

use levee_census_aggregate_models::{AggregatedAttribute, AggregationClass};

use crate::cv::coefficient_of_variation;

/// One source region's input to a target's aggregate for one variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    pub estimate: Option<f64>,
    pub moe: Option<f64>,
    pub weight_for_average: Option<f64>,
    pub weight_for_total: Option<f64>,
}

/// Folds a target's contributions into one attribute.
pub trait AggregationStrategy: Send + Sync {
    fn aggregate(&self, contributions: &[Contribution]) -> AggregatedAttribute;
}

/// Proportional areal apportionment for counts.
///
/// `value = Σ estimate·w_total`, `moe = sqrt(Σ (moe·w_total)²)`, treating
/// source errors as independent. Sources without an estimate contribute
/// nothing and the remaining weights are not renormalized, so partial
/// coverage undercounts; the engine reports it separately.
pub struct TotalStrategy;

impl AggregationStrategy for TotalStrategy {
    fn aggregate(&self, contributions: &[Contribution]) -> AggregatedAttribute {
        let mut sum = 0.0;
        let mut variance = 0.0;
        let mut weight_used = 0.0;
        let mut with_data = 0_u32;

        for c in contributions {
            let (Some(estimate), Some(w)) = (c.estimate, c.weight_for_total) else {
                continue;
            };
            sum += estimate * w;
            if let Some(moe) = c.moe {
                variance += (moe * w).powi(2);
            }
            weight_used += w;
            with_data += 1;
        }

        let (weighted_value, weighted_moe) = if with_data > 0 {
            (Some(sum), Some(variance.sqrt()))
        } else {
            (None, None)
        };

        AggregatedAttribute {
            weighted_value,
            weighted_moe,
            coefficient_of_variation: coefficient_of_variation(weighted_value, weighted_moe),
            n_source_regions_with_data: with_data,
            total_weight_used: weight_used,
        }
    }
}

/// Weighted mean for rates and typical values, renormalized over the
/// sources that actually have an estimate.
///
/// With `w` the average weights of sources with data and `W = Σ w`:
/// `value = Σ estimate·w / W`, `moe = sqrt(Σ (moe·w)²) / W`. Without the
/// renormalization a tract with missing data would dilute the mean toward
/// zero.
pub struct AverageStrategy;

impl AggregationStrategy for AverageStrategy {
    fn aggregate(&self, contributions: &[Contribution]) -> AggregatedAttribute {
        let mut weighted_sum = 0.0;
        let mut variance = 0.0;
        let mut effective_weight = 0.0;
        let mut with_data = 0_u32;

        for c in contributions {
            let (Some(estimate), Some(w)) = (c.estimate, c.weight_for_average) else {
                continue;
            };
            weighted_sum += estimate * w;
            if let Some(moe) = c.moe {
                variance += (moe * w).powi(2);
            }
            effective_weight += w;
            with_data += 1;
        }

        let (weighted_value, weighted_moe) = if effective_weight > 0.0 {
            (
                Some(weighted_sum / effective_weight),
                Some(variance.sqrt() / effective_weight),
            )
        } else {
            (None, None)
        };

        AggregatedAttribute {
            weighted_value,
            weighted_moe,
            coefficient_of_variation: coefficient_of_variation(weighted_value, weighted_moe),
            n_source_regions_with_data: with_data,
            total_weight_used: effective_weight,
        }
    }
}

/// The strategy implementing `class`.
#[must_use]
pub fn strategy_for(class: AggregationClass) -> &'static dyn AggregationStrategy {
    match class {
        AggregationClass::Average => &AverageStrategy,
        AggregationClass::Total => &TotalStrategy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(
        estimate: Option<f64>,
        moe: Option<f64>,
        weight_for_average: f64,
        weight_for_total: f64,
    ) -> Contribution {
        Contribution {
            estimate,
            moe,
            weight_for_average: Some(weight_for_average),
            weight_for_total: Some(weight_for_total),
        }
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("value should be present");
        assert!(
            (actual - expected).abs() <= 1e-9 * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn average_renormalizes_over_sources_with_data() {
        let attr = strategy_for(AggregationClass::Average).aggregate(&[
            contribution(Some(100.0), Some(10.0), 0.6, 0.5),
            contribution(None, None, 0.4, 0.5),
        ]);

        assert_close(attr.weighted_value, 100.0);
        assert_close(attr.weighted_moe, 10.0);
        assert_close(Some(attr.total_weight_used), 0.6);
        assert_eq!(attr.n_source_regions_with_data, 1);
    }

    #[test]
    fn average_without_any_data_is_null() {
        let attr = AverageStrategy.aggregate(&[contribution(None, Some(5.0), 1.0, 1.0)]);
        assert_eq!(attr.weighted_value, None);
        assert_eq!(attr.weighted_moe, None);
        assert_eq!(attr.coefficient_of_variation, None);
        assert_eq!(attr.n_source_regions_with_data, 0);
    }

    #[test]
    fn total_apportions_whole_tract() {
        let attr = strategy_for(AggregationClass::Total)
            .aggregate(&[contribution(Some(500.0), Some(50.0), 1.0, 1.0)]);
        assert_close(attr.weighted_value, 500.0);
        assert_close(attr.weighted_moe, 50.0);
    }

    #[test]
    fn total_moe_adds_in_quadrature() {
        let (w1, m1, w2, m2) = (0.7, 120.0, 0.15, 80.0);
        let attr = TotalStrategy.aggregate(&[
            contribution(Some(1000.0), Some(m1), 0.7, w1),
            contribution(Some(2000.0), Some(m2), 0.3, w2),
        ]);

        assert_close(attr.weighted_value, 1000.0f64.mul_add(w1, 2000.0 * w2));
        assert_close(attr.weighted_moe, (w1 * m1).hypot(w2 * m2));
        assert_close(Some(attr.total_weight_used), w1 + w2);
    }

    #[test]
    fn total_treats_missing_as_zero_without_renormalizing() {
        let attr = TotalStrategy.aggregate(&[
            contribution(Some(1000.0), Some(100.0), 0.5, 0.5),
            contribution(None, Some(100.0), 0.5, 0.5),
        ]);
        assert_close(attr.weighted_value, 500.0);
        assert_close(attr.weighted_moe, 50.0);
        assert_eq!(attr.n_source_regions_with_data, 1);
    }

    #[test]
    fn cv_follows_the_aggregate() {
        let attr = TotalStrategy.aggregate(&[contribution(Some(100.0), Some(16.45), 1.0, 1.0)]);
        assert_close(attr.coefficient_of_variation, 0.1);

        let zero = TotalStrategy.aggregate(&[contribution(Some(0.0), Some(16.45), 1.0, 1.0)]);
        assert_eq!(zero.coefficient_of_variation, None);
    }
}
