//! Coefficient of variation from a 90% margin of error.

/// z-value converting a 90%-confidence MOE into a standard error.
pub const MOE_Z_90: f64 = 1.645;

/// `(moe / 1.645) / value`.
///
/// A missing or non-positive value has no meaningful relative precision
/// and yields `None`; otherwise a missing or non-positive MOE is treated
/// as a perfectly precise estimate and yields `0.0`.
#[must_use]
pub fn coefficient_of_variation(value: Option<f64>, moe: Option<f64>) -> Option<f64> {
    let value = value.filter(|v| *v > 0.0)?;
    match moe {
        Some(moe) if moe > 0.0 => Some((moe / MOE_Z_90) / value),
        _ => Some(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_or_negative_value_has_no_cv() {
        assert_eq!(coefficient_of_variation(Some(0.0), Some(10.0)), None);
        assert_eq!(coefficient_of_variation(Some(-3.0), Some(10.0)), None);
        assert_eq!(coefficient_of_variation(None, Some(10.0)), None);
    }

    #[test]
    fn zero_moe_is_perfectly_precise() {
        assert_eq!(coefficient_of_variation(Some(100.0), Some(0.0)), Some(0.0));
    }

    #[test]
    fn standard_case() {
        let cv = coefficient_of_variation(Some(100.0), Some(16.45)).unwrap();
        assert!((cv - 0.1).abs() < 1e-12);
    }
}
