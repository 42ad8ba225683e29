//! Label encoding for categorical traits

use crate::error::{FlotillaError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Debug;

/// Maps labels to integer codes `0..n_classes`.
///
/// Classes are kept in sorted order, so the same set of labels always yields
/// the same codes regardless of the order samples arrive in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder<T> {
    classes: Vec<T>,
}

impl<T> LabelEncoder<T>
where
    T: Clone + PartialOrd + Debug,
{
    /// Learn the distinct classes in `labels`
    pub fn fit(labels: &[T]) -> Result<Self> {
        if labels.is_empty() {
            return Err(FlotillaError::DataError(
                "Cannot fit LabelEncoder on empty labels".to_string(),
            ));
        }
        // NaN-like values have no place in a sorted class list
        if let Some(bad) = labels.iter().find(|l| l.partial_cmp(l).is_none()) {
            return Err(FlotillaError::InvalidParameter {
                name: "label".to_string(),
                value: format!("{:?}", bad),
                reason: "labels must be totally ordered".to_string(),
            });
        }

        let mut classes = labels.to_vec();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        classes.dedup();

        Ok(Self { classes })
    }

    /// Sorted distinct classes
    pub fn classes(&self) -> &[T] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Encode labels; unseen labels are an error
    pub fn transform(&self, labels: &[T]) -> Result<Vec<usize>> {
        labels
            .iter()
            .map(|label| {
                self.classes
                    .binary_search_by(|c| c.partial_cmp(label).unwrap_or(Ordering::Less))
                    .map_err(|_| FlotillaError::DataError(format!("unseen label {:?}", label)))
            })
            .collect()
    }

    /// Decode codes back to labels
    pub fn inverse_transform(&self, codes: &[usize]) -> Result<Vec<T>> {
        codes
            .iter()
            .map(|&code| {
                self.classes.get(code).cloned().ok_or_else(|| FlotillaError::InvalidParameter {
                    name: "code".to_string(),
                    value: code.to_string(),
                    reason: format!("encoder has {} classes", self.classes.len()),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_codes() {
        let labels = vec!["S", "P", "M", "P"];
        let encoder = LabelEncoder::fit(&labels).unwrap();
        assert_eq!(encoder.classes(), &["M", "P", "S"]);
        assert_eq!(encoder.transform(&labels).unwrap(), vec![2, 1, 0, 1]);
    }

    #[test]
    fn test_inverse_transform() {
        let encoder = LabelEncoder::fit(&[2.0, 1.0, 2.0]).unwrap();
        assert_eq!(encoder.inverse_transform(&[0, 1]).unwrap(), vec![1.0, 2.0]);
        assert!(encoder.inverse_transform(&[2]).is_err());
    }

    #[test]
    fn test_numeric_order_is_numeric() {
        let encoder = LabelEncoder::fit(&[10.0, 2.0, 1.0]).unwrap();
        assert_eq!(encoder.transform(&[2.0, 10.0]).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_rejects_nan_and_unseen() {
        assert!(LabelEncoder::fit(&[1.0, f64::NAN]).is_err());
        let encoder = LabelEncoder::fit(&["A", "B"]).unwrap();
        assert!(encoder.transform(&["C"]).is_err());
    }
}
