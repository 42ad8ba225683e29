//! Random Forest implementation

use super::bagging::{mean_importances, BootstrapSample, OobAccumulator};
use super::config::{MaxFeatures, PredictorConfig, TaskType};
use super::decision_tree::{majority_class, Criterion, DecisionTree};
use super::models::Predictor;
use crate::error::{FlotillaError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Compute the out-of-bag score (needs `bootstrap`)
    pub oob_score: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Random state
    pub random_state: Option<u64>,
    is_classification: bool,
    oob_score_value: Option<f64>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new_classifier(100)
    }
}

impl RandomForest {
    /// Create a new classifier forest
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self::with_task(n_estimators, true)
    }

    /// Create a new regressor forest
    pub fn new_regressor(n_estimators: usize) -> Self {
        Self::with_task(n_estimators, false)
    }

    fn with_task(n_estimators: usize, is_classification: bool) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Auto,
            bootstrap: true,
            oob_score: false,
            criterion: if is_classification { Criterion::Gini } else { Criterion::MSE },
            random_state: None,
            is_classification,
            oob_score_value: None,
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Build an unfitted forest from resolved predictor settings
    pub fn from_config(task: TaskType, config: &PredictorConfig) -> Self {
        let mut forest = Self::with_task(config.n_estimators, task.is_classification());
        forest.max_depth = config.max_depth;
        forest.min_samples_split = config.min_samples_split;
        forest.min_samples_leaf = config.min_samples_leaf;
        forest.max_features = config.max_features;
        forest.bootstrap = config.bootstrap;
        forest.oob_score = config.oob_score;
        forest.random_state = config.random_state;
        forest
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Toggle bootstrap sampling
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Enable OOB score computation
    pub fn with_oob_score(mut self, oob_score: bool) -> Self {
        self.oob_score = oob_score;
        self
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(FlotillaError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(FlotillaError::TrainingError(format!(
                "Cannot fit a forest on {} samples x {} features",
                n_samples, n_features
            )));
        }

        let max_features = self.max_features.resolve(n_features, self.is_classification);
        let base_seed = self.random_state.unwrap_or_else(rand::random);

        // Build trees in parallel
        let fitted: Vec<(DecisionTree, BootstrapSample)> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<(DecisionTree, BootstrapSample)> {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                let sample = if self.bootstrap {
                    BootstrapSample::draw(n_samples, &mut rng)
                } else {
                    BootstrapSample::full(n_samples)
                };

                let x_boot = x.select(Axis(0), &sample.in_bag);
                let y_boot = y.select(Axis(0), &sample.in_bag);

                let mut tree = if self.is_classification {
                    DecisionTree::new_classifier()
                } else {
                    DecisionTree::new_regressor()
                }
                .with_min_samples_split(self.min_samples_split)
                .with_min_samples_leaf(self.min_samples_leaf)
                .with_criterion(self.criterion)
                .with_max_features(max_features)
                .with_random_state(rng.gen());
                tree.max_depth = self.max_depth;

                tree.fit(&x_boot, &y_boot)?;
                Ok((tree, sample))
            })
            .collect::<Result<Vec<_>>>()?;

        self.n_features = n_features;
        self.oob_score_value = if self.bootstrap && self.oob_score {
            let mut oob = OobAccumulator::new(n_samples);
            for (tree, sample) in &fitted {
                for &i in &sample.out_of_bag {
                    oob.add(i, tree.predict_row(x.row(i))?);
                }
            }
            oob.score(y, self.is_classification)
        } else {
            None
        };

        self.trees = fitted.into_iter().map(|(tree, _)| tree).collect();
        self.feature_importances = Some(mean_importances(
            self.trees.iter().filter_map(|t| t.feature_importances()),
            n_features,
        ));

        debug!(
            n_trees = self.trees.len(),
            max_features,
            oob_score = ?self.oob_score_value,
            "Random forest fitted"
        );

        Ok(self)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(FlotillaError::ModelNotFitted);
        }

        let all_predictions: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let n_trees = all_predictions.len() as f64;
        let predictions = (0..x.nrows())
            .map(|i| {
                let votes = all_predictions.iter().map(|p| p[i]);
                if self.is_classification {
                    majority_class(votes)
                } else {
                    votes.sum::<f64>() / n_trees
                }
            })
            .collect();

        Ok(predictions)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get OOB score
    pub fn oob_score_value(&self) -> Option<f64> {
        self.oob_score_value
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Predictor for RandomForest {
    fn name(&self) -> &str {
        if self.is_classification {
            "RandomForestClassifier"
        } else {
            "RandomForestRegressor"
        }
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForest::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForest::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    fn oob_score(&self) -> Option<f64> {
        self.oob_score_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier() {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.2],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut rf = RandomForest::new_classifier(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();

        let accuracy = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count() as f64
            / y.len() as f64;

        assert!(accuracy >= 0.8, "Accuracy too low: {}", accuracy);
    }

    #[test]
    fn test_regressor() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut rf = RandomForest::new_regressor(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();

        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;

        assert!(mse < 2.0, "MSE too high: {}", mse);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut rf = RandomForest::new_regressor(10)
            .with_bootstrap(false)
            .with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert_eq!(importances[1], 0.0);
        assert!((importances.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_oob_score_needs_bootstrap() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| (i * (j + 1)) as f64);
        let y = Array1::from_shape_fn(20, |i| if i < 10 { 0.0 } else { 1.0 });

        let mut rf = RandomForest::new_classifier(20)
            .with_oob_score(true)
            .with_random_state(0);
        rf.fit(&x, &y).unwrap();
        let oob = rf.oob_score_value().unwrap();
        assert!((0.0..=1.0).contains(&oob));

        let mut no_bag = RandomForest::new_classifier(5)
            .with_bootstrap(false)
            .with_oob_score(true);
        no_bag.fit(&x, &y).unwrap();
        assert_eq!(no_bag.oob_score_value(), None);
    }

    #[test]
    fn test_seeded_fit_is_deterministic() {
        let x = Array2::from_shape_fn((12, 3), |(i, j)| ((i * 7 + j * 3) % 5) as f64);
        let y = Array1::from_shape_fn(12, |i| (i % 2) as f64);

        let mut a = RandomForest::new_classifier(8).with_random_state(3);
        let mut b = RandomForest::new_classifier(8).with_random_state(3);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.feature_importances(), b.feature_importances());
    }

    #[test]
    fn test_fit_rejects_mismatched_target() {
        let mut rf = RandomForest::new_regressor(3);
        let result = rf.fit(&array![[1.0], [2.0]], &array![1.0]);
        assert!(matches!(result, Err(FlotillaError::ShapeError { .. })));
    }
}
