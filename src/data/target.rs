//! Single-trait target series

use super::table::string_column;
use crate::error::{FlotillaError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-sample trait values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetValues {
    /// Continuous values (regression, or numeric class labels)
    Numeric(Vec<f64>),
    /// Categorical labels
    Categorical(Vec<String>),
}

impl TargetValues {
    pub fn len(&self) -> usize {
        match self {
            TargetValues::Numeric(v) => v.len(),
            TargetValues::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select(&self, rows: &[usize]) -> Self {
        match self {
            TargetValues::Numeric(v) => TargetValues::Numeric(rows.iter().map(|&r| v[r]).collect()),
            TargetValues::Categorical(v) => {
                TargetValues::Categorical(rows.iter().map(|&r| v[r].clone()).collect())
            }
        }
    }
}

/// A named trait with one value per sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSeries {
    name: String,
    index: Vec<String>,
    values: TargetValues,
}

impl TargetSeries {
    /// Create a series; the index must be unique and match the values in length
    pub fn new(name: impl Into<String>, index: Vec<String>, values: TargetValues) -> Result<Self> {
        let name = name.into();
        if index.len() != values.len() {
            return Err(FlotillaError::ShapeError {
                expected: format!("{} values for trait \"{}\"", index.len(), name),
                actual: format!("{} values", values.len()),
            });
        }

        let mut seen = std::collections::HashSet::with_capacity(index.len());
        if let Some(dup) = index.iter().find(|s| !seen.insert(s.as_str())) {
            return Err(FlotillaError::DataError(format!(
                "duplicate sample id \"{}\" in trait \"{}\"",
                dup, name
            )));
        }

        Ok(Self { name, index, values })
    }

    /// Continuous trait
    pub fn numeric(name: impl Into<String>, index: Vec<String>, values: Vec<f64>) -> Result<Self> {
        Self::new(name, index, TargetValues::Numeric(values))
    }

    /// Categorical trait
    pub fn categorical<S: Into<String>>(
        name: impl Into<String>,
        index: Vec<String>,
        labels: Vec<S>,
    ) -> Result<Self> {
        let labels = labels.into_iter().map(Into::into).collect();
        Self::new(name, index, TargetValues::Categorical(labels))
    }

    /// Read a trait column from sample metadata.
    ///
    /// Numeric columns become [`TargetValues::Numeric`], anything else is read
    /// as categorical strings. Samples with a missing trait value are dropped.
    pub fn from_dataframe(df: &DataFrame, index_column: &str, target_column: &str) -> Result<Self> {
        let index = string_column(df, index_column)?;
        let column = df
            .column(target_column)
            .map_err(|_| FlotillaError::FeatureNotFound(target_column.to_string()))?;
        let series = column.as_materialized_series();

        let (index, values) = if series.dtype().is_primitive_numeric() {
            let cast = series.cast(&DataType::Float64)?;
            let (idx, vals): (Vec<String>, Vec<f64>) = index
                .into_iter()
                .zip(cast.f64()?.into_iter())
                .filter_map(|(sample, v)| v.filter(|x| !x.is_nan()).map(|x| (sample, x)))
                .unzip();
            (idx, TargetValues::Numeric(vals))
        } else {
            let cast = series.cast(&DataType::String)?;
            let (idx, vals): (Vec<String>, Vec<String>) = index
                .into_iter()
                .zip(cast.str()?.into_iter())
                .filter_map(|(sample, v)| v.map(|s| (sample, s.to_string())))
                .unzip();
            (idx, TargetValues::Categorical(vals))
        };

        Self::new(target_column, index, values)
    }

    /// Trait name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sample ids
    pub fn index(&self) -> &[String] {
        &self.index
    }

    pub fn values(&self) -> &TargetValues {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub(crate) fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            name: self.name.clone(),
            index: rows.iter().map(|&r| self.index[r].clone()).collect(),
            values: self.values.select(rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("s{}", i)).collect()
    }

    #[test]
    fn test_length_mismatch() {
        let result = TargetSeries::numeric("age", ids(3), vec![1.0, 2.0]);
        assert!(matches!(result, Err(FlotillaError::ShapeError { .. })));
    }

    #[test]
    fn test_duplicate_index() {
        let index = vec!["s1".to_string(), "s1".to_string()];
        let result = TargetSeries::categorical("celltype", index, vec!["A", "B"]);
        assert!(matches!(result, Err(FlotillaError::DataError(_))));
    }

    #[test]
    fn test_from_dataframe_categorical_drops_nulls() {
        let df = df!(
            "sample_id" => &["s1", "s2", "s3"],
            "phenotype" => &[Some("P"), None, Some("S")]
        )
        .unwrap();

        let target = TargetSeries::from_dataframe(&df, "sample_id", "phenotype").unwrap();
        assert_eq!(target.name(), "phenotype");
        assert_eq!(target.index(), &["s1".to_string(), "s3".to_string()]);
        assert_eq!(
            target.values(),
            &TargetValues::Categorical(vec!["P".to_string(), "S".to_string()])
        );
    }

    #[test]
    fn test_from_dataframe_numeric() {
        let df = df!(
            "sample_id" => &["s1", "s2"],
            "pooled" => &[0.5, 1.5]
        )
        .unwrap();

        let target = TargetSeries::from_dataframe(&df, "sample_id", "pooled").unwrap();
        assert_eq!(target.values(), &TargetValues::Numeric(vec![0.5, 1.5]));
    }
}
