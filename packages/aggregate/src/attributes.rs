//! Source-region attribute table.
//!
//! One row per source id, one nullable numeric cell per column. Missing
//! values are represented as `None` from the moment a row is inserted:
//! sentinel values are normalized by [`normalize_sentinel`] at ingestion
//! and never seen by the aggregation arithmetic.

use std::collections::BTreeMap;

use crate::AggregateError;

/// Converts a raw cell into an optional value. Non-finite numbers and any
/// of `sentinels` become `None`.
#[must_use]
pub fn normalize_sentinel(raw: f64, sentinels: &[f64]) -> Option<f64> {
    #[allow(clippy::float_cmp)]
    let is_sentinel = sentinels.iter().any(|s| *s == raw);
    (raw.is_finite() && !is_sentinel).then_some(raw)
}

/// Attribute values keyed by source id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeTable {
    columns: Vec<String>,
    rows: BTreeMap<String, Vec<Option<f64>>>,
}

impl AttributeTable {
    #[must_use]
    pub const fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: BTreeMap::new(),
        }
    }

    /// Adds a row of already-normalized values.
    ///
    /// # Errors
    ///
    /// Returns an error if the row width does not match the column count
    /// or the source id is already present.
    pub fn insert(
        &mut self,
        source_id: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<(), AggregateError> {
        let source_id = source_id.into();
        if values.len() != self.columns.len() {
            return Err(AggregateError::RowWidth {
                source_id,
                expected: self.columns.len(),
                found: values.len(),
            });
        }
        if self.rows.contains_key(&source_id) {
            return Err(AggregateError::DuplicateSource { source_id });
        }
        self.rows.insert(source_id, values);
        Ok(())
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[must_use]
    pub fn row(&self, source_id: &str) -> Option<&[Option<f64>]> {
        self.rows.get(source_id).map(Vec::as_slice)
    }

    #[must_use]
    pub fn value(&self, source_id: &str, column: usize) -> Option<f64> {
        self.row(source_id)?.get(column).copied().flatten()
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use levee_census_aggregate_models::ACS_MISSING_SENTINEL;

    use super::*;

    #[test]
    fn sentinel_becomes_none() {
        let sentinels = [ACS_MISSING_SENTINEL];
        assert_eq!(normalize_sentinel(-666_666_666.0, &sentinels), None);
        assert_eq!(normalize_sentinel(f64::NAN, &sentinels), None);
        assert_eq!(normalize_sentinel(-5.0, &sentinels), Some(-5.0));
        assert_eq!(normalize_sentinel(0.0, &sentinels), Some(0.0));
    }

    #[test]
    fn sentinel_cells_read_back_as_missing() {
        let sentinels = [ACS_MISSING_SENTINEL];
        let mut table = AttributeTable::new(vec!["income".into(), "income_moe".into()]);
        table
            .insert(
                "22071000100",
                [-666_666_666.0, 1200.0]
                    .iter()
                    .map(|v| normalize_sentinel(*v, &sentinels))
                    .collect(),
            )
            .unwrap();

        let income = table.column_index("income").unwrap();
        let moe = table.column_index("income_moe").unwrap();
        assert_eq!(table.value("22071000100", income), None);
        assert_eq!(table.value("22071000100", moe), Some(1200.0));
        assert_eq!(table.value("missing", income), None);
    }

    #[test]
    fn rejects_bad_rows() {
        let mut table = AttributeTable::new(vec!["a".into()]);
        assert!(matches!(
            table.insert("x", vec![Some(1.0), None]),
            Err(AggregateError::RowWidth { .. })
        ));
        table.insert("x", vec![Some(1.0)]).unwrap();
        assert!(matches!(
            table.insert("x", vec![Some(2.0)]),
            Err(AggregateError::DuplicateSource { .. })
        ));
    }
}
