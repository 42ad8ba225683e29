//! Inner-join alignment of features and trait

use super::{FeatureTable, TargetSeries};
use crate::error::{FlotillaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Features and trait restricted to their common samples.
///
/// Row order follows the feature table. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedDataset {
    features: FeatureTable,
    target: TargetSeries,
}

impl AlignedDataset {
    /// Inner-join `features` and `target` on sample id.
    ///
    /// Samples present in only one input are dropped. An empty intersection
    /// is an error.
    pub fn align(features: &FeatureTable, target: &TargetSeries) -> Result<Self> {
        let target_rows: HashMap<&str, usize> = target
            .index()
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();

        let (feature_rows, trait_rows): (Vec<usize>, Vec<usize>) = features
            .index()
            .iter()
            .enumerate()
            .filter_map(|(i, s)| target_rows.get(s.as_str()).map(|&j| (i, j)))
            .unzip();

        if feature_rows.is_empty() {
            return Err(FlotillaError::EmptyAlignment {
                n_feature_samples: features.n_samples(),
                n_target_samples: target.len(),
            });
        }

        debug!(
            trait_name = target.name(),
            kept = feature_rows.len(),
            dropped_features = features.n_samples() - feature_rows.len(),
            dropped_trait = target.len() - trait_rows.len(),
            "Aligned features and trait"
        );

        Ok(Self {
            features: features.select_rows(&feature_rows),
            target: target.select_rows(&trait_rows),
        })
    }

    pub fn features(&self) -> &FeatureTable {
        &self.features
    }

    pub fn target(&self) -> &TargetSeries {
        &self.target
    }

    /// Shared sample ids, in feature-table order
    pub fn index(&self) -> &[String] {
        self.features.index()
    }

    pub fn n_samples(&self) -> usize {
        self.features.n_samples()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TargetValues;
    use ndarray::array;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn table() -> FeatureTable {
        FeatureTable::new(
            strings(&["s4", "s1", "s3", "s2"]),
            strings(&["f0", "f1"]),
            array![[4.0, 40.0], [1.0, 10.0], [3.0, 30.0], [2.0, 20.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_align_keeps_feature_order() {
        let target =
            TargetSeries::categorical("group", strings(&["s1", "s2", "s4", "s9"]), vec!["A", "B", "A", "B"])
                .unwrap();

        let aligned = AlignedDataset::align(&table(), &target).unwrap();
        assert_eq!(aligned.index(), &strings(&["s4", "s1", "s2"])[..]);
        assert_eq!(aligned.target().index(), aligned.index());
        assert_eq!(
            aligned.target().values(),
            &TargetValues::Categorical(strings(&["A", "A", "B"]))
        );
        assert_eq!(aligned.features().values(), &array![[4.0, 40.0], [1.0, 10.0], [2.0, 20.0]]);
    }

    #[test]
    fn test_align_empty_intersection() {
        let target = TargetSeries::numeric("age", strings(&["x1", "x2"]), vec![1.0, 2.0]).unwrap();
        let result = AlignedDataset::align(&table(), &target);
        assert!(matches!(
            result,
            Err(FlotillaError::EmptyAlignment { n_feature_samples: 4, n_target_samples: 2 })
        ));
    }
}
