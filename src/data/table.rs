//! Samples x features numeric table

use crate::error::{FlotillaError, Result};
use ndarray::{Array2, ArrayView1, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Samples x features matrix with labelled rows and columns.
///
/// Rows are samples (the index), columns are features. Both sets of labels
/// are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    index: Vec<String>,
    columns: Vec<String>,
    values: Array2<f64>,
}

impl FeatureTable {
    /// Create a table, checking the shape and label uniqueness
    pub fn new(index: Vec<String>, columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.nrows() != index.len() || values.ncols() != columns.len() {
            return Err(FlotillaError::ShapeError {
                expected: format!("({}, {})", index.len(), columns.len()),
                actual: format!("({}, {})", values.nrows(), values.ncols()),
            });
        }
        ensure_unique("sample", &index)?;
        ensure_unique("feature", &columns)?;

        if let Some(((row, col), v)) = values.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(FlotillaError::DataError(format!(
                "feature '{}' has non-finite value {} for sample '{}'",
                columns[col], v, index[row]
            )));
        }

        Ok(Self { index, columns, values })
    }

    /// Build a table from a DataFrame, taking sample ids from `index_column`
    /// and every other column as a numeric feature.
    pub fn from_dataframe(df: &DataFrame, index_column: &str) -> Result<Self> {
        let index = string_column(df, index_column)?;

        let columns: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != index_column)
            .map(|s| s.to_string())
            .collect();

        let col_data: Vec<Vec<f64>> = columns
            .iter()
            .map(|col_name| {
                let column = df
                    .column(col_name)
                    .map_err(|_| FlotillaError::FeatureNotFound(col_name.clone()))?;
                let series = column.as_materialized_series().cast(&DataType::Float64)?;
                let values: Vec<f64> = series
                    .f64()?
                    .into_iter()
                    .map(|v| v.unwrap_or(0.0))
                    .collect();
                Ok(values)
            })
            .collect::<Result<Vec<Vec<f64>>>>()?;

        let n_rows = df.height();
        let values = Array2::from_shape_fn((n_rows, columns.len()), |(r, c)| col_data[c][r]);

        Self::new(index, columns, values)
    }

    /// Sample ids
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Feature ids
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Underlying values
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn n_samples(&self) -> usize {
        self.index.len()
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// (n_samples, n_features)
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Values of a single feature, by id
    pub fn column(&self, feature: &str) -> Option<ArrayView1<'_, f64>> {
        self.columns
            .iter()
            .position(|c| c == feature)
            .map(|idx| self.values.column(idx))
    }

    /// Keep the given rows, in the given order
    pub(crate) fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            index: rows.iter().map(|&r| self.index[r].clone()).collect(),
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), rows),
        }
    }

    /// Keep the features whose mask entry is true. Row order is unchanged.
    pub fn select_columns(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.columns.len() {
            return Err(FlotillaError::ShapeError {
                expected: format!("mask length = {}", self.columns.len()),
                actual: format!("mask length = {}", mask.len()),
            });
        }

        let keep: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|(_, &m)| m)
            .map(|(i, _)| i)
            .collect();

        Ok(Self {
            index: self.index.clone(),
            columns: keep.iter().map(|&c| self.columns[c].clone()).collect(),
            values: self.values.select(Axis(1), &keep),
        })
    }
}

fn ensure_unique(kind: &str, labels: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(labels.len());
    for label in labels {
        if !seen.insert(label.as_str()) {
            return Err(FlotillaError::DataError(format!(
                "duplicate {} id \"{}\"",
                kind, label
            )));
        }
    }
    Ok(())
}

/// Read a column as strings, rejecting nulls (used for sample ids)
pub(crate) fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = df
        .column(name)
        .map_err(|_| FlotillaError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;

    series
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(|s| s.to_string()).ok_or_else(|| {
                FlotillaError::DataError(format!("missing sample id in column \"{}\" at row {}", name, row))
            })
        })
        .collect()
}
