//! Gradient Boosting implementation
//!
//! Gradient boosted regression trees with row subsampling and per-tree
//! feature subsampling. The classifier fits binary log-loss.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::PredictorConfig;
use super::decision_tree::DecisionTree;
use super::models::Predictor;
use crate::error::{FlotillaError, Result};

/// Depth used when the config leaves it unbounded
const DEFAULT_BOOSTING_DEPTH: usize = 3;

/// Trees plus the columns each one was trained on
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BoostedTrees {
    trees: Vec<DecisionTree>,
    col_indices_per_tree: Vec<Vec<usize>>,
    feature_importances: Option<Array1<f64>>,
}

impl BoostedTrees {
    /// Run the boosting rounds. `gradient` maps current raw scores to the
    /// pseudo-residuals the next tree fits.
    fn boost<G>(
        config: &PredictorConfig,
        is_classification: bool,
        x: &Array2<f64>,
        init: f64,
        gradient: G,
    ) -> Result<Self>
    where
        G: Fn(&Array1<f64>) -> Array1<f64>,
    {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let mut rng = match config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let row_count = ((n_samples as f64) * config.subsample).ceil().max(1.0) as usize;
        let col_count = config.max_features.resolve(n_features, is_classification);
        let depth = config.max_depth.unwrap_or(DEFAULT_BOOSTING_DEPTH);

        let mut raw = Array1::from_elem(n_samples, init);
        let mut importances = Array1::<f64>::zeros(n_features);
        let mut boosted = Self::default();

        for _ in 0..config.n_estimators {
            let residuals = gradient(&raw);

            let rows = sample_sorted(n_samples, row_count, &mut rng);
            let cols = sample_sorted(n_features, col_count, &mut rng);

            let x_cols = x.select(Axis(1), &cols);
            let x_sub = x_cols.select(Axis(0), &rows);
            let y_sub = residuals.select(Axis(0), &rows);

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(depth)
                .with_min_samples_split(config.min_samples_split)
                .with_min_samples_leaf(config.min_samples_leaf);
            tree.fit(&x_sub, &y_sub)?;

            let update = tree.predict(&x_cols)?;
            raw.scaled_add(config.learning_rate, &update);

            if let Some(tree_importance) = tree.feature_importances() {
                for (j, &col_idx) in cols.iter().enumerate() {
                    importances[col_idx] += tree_importance[j];
                }
            }

            boosted.trees.push(tree);
            boosted.col_indices_per_tree.push(cols);
        }

        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        boosted.feature_importances = Some(importances);

        debug!(
            n_trees = boosted.trees.len(),
            rows_per_tree = row_count,
            cols_per_tree = col_count,
            "Gradient boosting fitted"
        );

        Ok(boosted)
    }

    fn raw_scores(&self, x: &Array2<f64>, init: f64, learning_rate: f64) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(FlotillaError::ModelNotFitted);
        }
        let mut raw = Array1::from_elem(x.nrows(), init);
        for (tree, cols) in self.trees.iter().zip(&self.col_indices_per_tree) {
            let x_sub = x.select(Axis(1), cols);
            raw.scaled_add(learning_rate, &tree.predict(&x_sub)?);
        }
        Ok(raw)
    }
}

fn sample_sorted<R: Rng>(n: usize, k: usize, rng: &mut R) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k.min(n));
    indices.sort_unstable();
    indices
}

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(FlotillaError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.ncols() == 0 {
        return Err(FlotillaError::TrainingError("Cannot boost on zero features".to_string()));
    }
    Ok(())
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: PredictorConfig,
    ensemble: BoostedTrees,
    initial_prediction: f64,
}

impl GradientBoostingRegressor {
    pub fn from_config(config: &PredictorConfig) -> Self {
        Self {
            config: config.clone(),
            ensemble: BoostedTrees::default(),
            initial_prediction: 0.0,
        }
    }

    /// Fit with squared loss
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;

        self.initial_prediction = y.mean().unwrap_or(0.0);
        self.ensemble = BoostedTrees::boost(&self.config, false, x, self.initial_prediction, |raw| {
            y - raw
        })?;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.ensemble
            .raw_scores(x, self.initial_prediction, self.config.learning_rate)
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.ensemble.feature_importances.as_ref()
    }
}

/// Gradient Boosting Classifier (binary)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: PredictorConfig,
    ensemble: BoostedTrees,
    initial_log_odds: f64,
    classes: Vec<f64>,
}

impl GradientBoostingClassifier {
    pub fn from_config(config: &PredictorConfig) -> Self {
        Self {
            config: config.clone(),
            ensemble: BoostedTrees::default(),
            initial_log_odds: 0.0,
            classes: Vec::new(),
        }
    }

    /// Fit binary log-loss; the larger class value is the positive class
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        if classes.len() > 2 {
            return Err(FlotillaError::TrainingError(format!(
                "GradientBoostingClassifier supports binary targets only, got {} classes",
                classes.len()
            )));
        }

        let positive = classes.last().copied().unwrap_or(1.0);
        let y01: Array1<f64> = y.mapv(|v| if v == positive && classes.len() == 2 { 1.0 } else { 0.0 });

        let p = y01.mean().unwrap_or(0.5).clamp(1e-10, 1.0 - 1e-10);
        self.initial_log_odds = (p / (1.0 - p)).ln();
        self.classes = classes;

        self.ensemble = BoostedTrees::boost(&self.config, true, x, self.initial_log_odds, |raw| {
            &y01 - &raw.mapv(sigmoid)
        })?;
        Ok(())
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        let negative = self.classes.first().copied().unwrap_or(0.0);
        let positive = self.classes.last().copied().unwrap_or(1.0);
        Ok(probs.mapv(|p| if p >= 0.5 { positive } else { negative }))
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let raw = self
            .ensemble
            .raw_scores(x, self.initial_log_odds, self.config.learning_rate)?;
        Ok(raw.mapv(sigmoid))
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.ensemble.feature_importances.as_ref()
    }
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

impl Predictor for GradientBoostingRegressor {
    fn name(&self) -> &str {
        "GradientBoostingRegressor"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GradientBoostingRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostingRegressor::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.ensemble.feature_importances.clone()
    }
}

impl Predictor for GradientBoostingClassifier {
    fn name(&self) -> &str {
        "GradientBoostingClassifier"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GradientBoostingClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostingClassifier::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.ensemble.feature_importances.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::config::MaxFeatures;

    fn create_regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((100, 2), (0..200).map(|i| i as f64 * 0.1).collect()).unwrap();

        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| row[0] * 2.0 + row[1] * 0.5 + 1.0)
            .collect();

        (x, y)
    }

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((100, 2), (0..200).map(|i| i as f64 * 0.1).collect()).unwrap();

        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| if row[0] + row[1] > 10.0 { 1.0 } else { 0.0 })
            .collect();

        (x, y)
    }

    fn small_config() -> PredictorConfig {
        PredictorConfig {
            n_estimators: 10,
            max_depth: Some(3),
            max_features: MaxFeatures::All,
            subsample: 0.8,
            ..Default::default()
        }
    }

    #[test]
    fn test_gradient_boosting_regressor() {
        let (x, y) = create_regression_data();
        let mut model = GradientBoostingRegressor::from_config(&small_config());
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        assert_eq!(predictions.len(), 100);

        let mse: f64 = y
            .iter()
            .zip(predictions.iter())
            .map(|(yi, pi)| (yi - pi).powi(2))
            .sum::<f64>()
            / y.len() as f64;

        let y_var = y.var(0.0);
        assert!(mse < y_var, "MSE ({}) should be less than variance ({})", mse, y_var);
    }

    #[test]
    fn test_gradient_boosting_classifier() {
        let (x, y) = create_classification_data();
        let mut model = GradientBoostingClassifier::from_config(&small_config());
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        let correct = y
            .iter()
            .zip(predictions.iter())
            .filter(|(&yi, &pi)| (yi - pi).abs() < 0.5)
            .count();

        let accuracy = correct as f64 / y.len() as f64;
        assert!(accuracy > 0.7, "Accuracy ({}) should be above 70%", accuracy);
    }

    #[test]
    fn test_classifier_rejects_multiclass() {
        let (x, _) = create_classification_data();
        let y = Array1::from_shape_fn(100, |i| (i % 3) as f64);
        let mut model = GradientBoostingClassifier::from_config(&small_config());
        assert!(matches!(model.fit(&x, &y), Err(FlotillaError::TrainingError(_))));
    }

    #[test]
    fn test_feature_importances() {
        let (x, y) = create_regression_data();
        let mut model = GradientBoostingRegressor::from_config(&small_config());
        model.fit(&x, &y).unwrap();

        let importances = model.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);

        let sum: f64 = importances.sum();
        assert!((sum - 1.0).abs() < 0.01, "Sum of importances ({}) should be ~1", sum);
    }

    #[test]
    fn test_boosting_preset_caps_columns() {
        let (x, y) = create_classification_data();
        let params = crate::training::config::PredictorParams::boosting_preset();
        let config = PredictorConfig::from_params(&params).unwrap();
        let mut model = GradientBoostingClassifier::from_config(&config);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.feature_importances().unwrap().len(), 2);
    }
}
