//! Extra Trees (Extremely Randomized Trees) implementation
//!
//! Unlike Random Forest which searches for the best threshold of each candidate
//! feature, Extra Trees draws one threshold per candidate at random and keeps
//! the candidate with the largest impurity decrease.

use super::bagging::{mean_importances, BootstrapSample, OobAccumulator};
use super::config::{MaxFeatures, PredictorConfig, TaskType};
use super::decision_tree::majority_class;
use super::models::Predictor;
use crate::error::{FlotillaError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// An extremely randomized tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
enum ExtraTreeNode {
    Leaf { value: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<ExtraTreeNode>,
        right: Box<ExtraTreeNode>,
    },
}

impl ExtraTreeNode {
    fn predict_sample(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            ExtraTreeNode::Leaf { value } => *value,
            ExtraTreeNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict_sample(sample)
                } else {
                    right.predict_sample(sample)
                }
            }
        }
    }
}

/// Stopping rules and feature budget for one tree
#[derive(Debug, Clone, Copy)]
struct GrowParams {
    max_features: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    is_classification: bool,
}

/// Extra Trees model (Classifier + Regressor)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraTrees {
    trees: Vec<ExtraTreeNode>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split
    pub max_features: MaxFeatures,
    /// Draw a bootstrap sample per tree instead of using every row
    pub bootstrap: bool,
    pub oob_score: bool,
    pub random_state: Option<u64>,
    is_classification: bool,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    oob_score_value: Option<f64>,
}

impl Default for ExtraTrees {
    fn default() -> Self {
        Self::new_classifier(100)
    }
}

impl ExtraTrees {
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self::with_task(n_estimators, true)
    }

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
            bootstrap: false,
            oob_score: false,
            random_state: None,
            is_classification,
            n_features: 0,
            feature_importances: None,
            oob_score_value: None,
        }
    }

    /// Build an unfitted ensemble from resolved predictor settings
    pub fn from_config(task: TaskType, config: &PredictorConfig) -> Self {
        let mut model = Self::with_task(config.n_estimators, task.is_classification());
        model.max_depth = config.max_depth;
        model.min_samples_split = config.min_samples_split;
        model.min_samples_leaf = config.min_samples_leaf;
        model.max_features = config.max_features;
        model.bootstrap = config.bootstrap;
        model.oob_score = config.oob_score;
        model.random_state = config.random_state;
        model
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_oob_score(mut self, oob_score: bool) -> Self {
        self.oob_score = oob_score;
        self
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Grow a single extra tree, adding weighted impurity decreases to `importances`
    fn build_tree(
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        params: GrowParams,
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> ExtraTreeNode {
        let n = indices.len();

        if n < params.min_samples_split
            || n <= 1
            || params.max_depth.map_or(false, |d| depth >= d)
        {
            return ExtraTreeNode::Leaf {
                value: leaf_value(y, indices, params.is_classification),
            };
        }

        let first_y = y[indices[0]];
        if indices.iter().all(|&i| (y[i] - first_y).abs() < 1e-15) {
            return ExtraTreeNode::Leaf { value: first_y };
        }

        let n_features = x.ncols();
        let candidates = if params.max_features >= n_features {
            (0..n_features).collect()
        } else {
            sample(rng, n_features, params.max_features).into_vec()
        };

        let parent = impurity(y, indices, params.is_classification);
        let mut best: Option<(usize, f64, f64)> = None;

        for f in candidates {
            let (fmin, fmax) = indices.iter().fold((f64::MAX, f64::MIN), |(lo, hi), &i| {
                let v = x[[i, f]];
                (lo.min(v), hi.max(v))
            });

            // constant within this node
            if !(fmax - fmin > 1e-15) {
                continue;
            }

            // interpolate instead of sampling fmin..fmax, whose width can overflow
            let u: f64 = rng.gen();
            let threshold = fmin * (1.0 - u) + fmax * u;
            if threshold >= fmax {
                continue;
            }

            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, f]] <= threshold);

            if left_idx.len() < params.min_samples_leaf || right_idx.len() < params.min_samples_leaf {
                continue;
            }

            let decrease = n as f64 * parent
                - left_idx.len() as f64 * impurity(y, &left_idx, params.is_classification)
                - right_idx.len() as f64 * impurity(y, &right_idx, params.is_classification);

            if best.map_or(true, |(_, _, d)| decrease > d) {
                best = Some((f, threshold, decrease));
            }
        }

        let Some((feature, threshold, decrease)) = best else {
            return ExtraTreeNode::Leaf {
                value: leaf_value(y, indices, params.is_classification),
            };
        };
        importances[feature] += decrease.max(0.0);

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

        let left = Self::build_tree(x, y, &left_idx, params, depth + 1, importances, rng);
        let right = Self::build_tree(x, y, &right_idx, params, depth + 1, importances, rng);

        ExtraTreeNode::Split {
            feature,
            threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(FlotillaError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples < self.min_samples_split || n_features == 0 {
            return Err(FlotillaError::TrainingError(format!(
                "Need at least {} samples and one feature, got {} x {}",
                self.min_samples_split, n_samples, n_features
            )));
        }

        let params = GrowParams {
            max_features: self.max_features.resolve(n_features, self.is_classification),
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            is_classification: self.is_classification,
        };
        let base_seed = self.random_state.unwrap_or_else(rand::random);
        let bootstrap = self.bootstrap;

        let grown: Vec<(ExtraTreeNode, Array1<f64>, BootstrapSample)> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                let sample = if bootstrap {
                    BootstrapSample::draw(n_samples, &mut rng)
                } else {
                    BootstrapSample::full(n_samples)
                };

                let mut importances = vec![0.0; n_features];
                let tree = Self::build_tree(x, y, &sample.in_bag, params, 0, &mut importances, &mut rng);

                let mut importances = Array1::from_vec(importances);
                let total = importances.sum();
                if total > 0.0 {
                    importances /= total;
                }
                (tree, importances, sample)
            })
            .collect();

        self.oob_score_value = if self.bootstrap && self.oob_score {
            let mut oob = OobAccumulator::new(n_samples);
            for (tree, _, sample) in &grown {
                for &i in &sample.out_of_bag {
                    oob.add(i, tree.predict_sample(x.row(i)));
                }
            }
            oob.score(y, self.is_classification)
        } else {
            None
        };

        self.feature_importances = Some(mean_importances(grown.iter().map(|(_, imp, _)| imp), n_features));
        self.trees = grown.into_iter().map(|(tree, _, _)| tree).collect();
        self.n_features = n_features;

        debug!(
            n_trees = self.trees.len(),
            max_features = params.max_features,
            oob_score = ?self.oob_score_value,
            "Extra trees fitted"
        );

        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(FlotillaError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(FlotillaError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let n_trees = self.trees.len() as f64;
        let predictions = x
            .rows()
            .into_iter()
            .map(|row| {
                let votes = self.trees.iter().map(|t| t.predict_sample(row));
                if self.is_classification {
                    majority_class(votes)
                } else {
                    votes.sum::<f64>() / n_trees
                }
            })
            .collect();

        Ok(predictions)
    }

    /// Mean impurity-decrease importances, normalized to sum 1
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn oob_score_value(&self) -> Option<f64> {
        self.oob_score_value
    }

    /// Accuracy (classification) or R^2 (regression) on `x`, `y`
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let preds = self.predict(x)?;
        if self.is_classification {
            let correct = preds
                .iter()
                .zip(y.iter())
                .filter(|(p, a)| (*p - *a).abs() < 0.5)
                .count();
            Ok(correct as f64 / y.len() as f64)
        } else {
            let ym = y.mean().unwrap_or(0.0);
            let ss_res = (&preds - y).mapv(|v| v * v).sum();
            let ss_tot = y.mapv(|v| (v - ym).powi(2)).sum();
            Ok(if ss_tot == 0.0 { 1.0 } else { 1.0 - ss_res / ss_tot })
        }
    }
}

impl Predictor for ExtraTrees {
    fn name(&self) -> &str {
        if self.is_classification {
            "ExtraTreesClassifier"
        } else {
            "ExtraTreesRegressor"
        }
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        ExtraTrees::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        ExtraTrees::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    fn oob_score(&self) -> Option<f64> {
        self.oob_score_value
    }
}

fn leaf_value(y: &Array1<f64>, indices: &[usize], is_classification: bool) -> f64 {
    if is_classification {
        majority_class(indices.iter().map(|&i| y[i]))
    } else {
        indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len().max(1) as f64
    }
}

/// Gini impurity for class codes, variance otherwise
fn impurity(y: &Array1<f64>, indices: &[usize], is_classification: bool) -> f64 {
    let n = indices.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    if is_classification {
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for &i in indices {
            *counts.entry(y[i].round() as i64).or_insert(0) += 1;
        }
        1.0 - counts.values().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
    } else {
        let mean: f64 = indices.iter().map(|&i| y[i]).sum::<f64>() / n;
        indices.iter().map(|&i| (y[i] - mean).powi(2)).sum::<f64>() / n
    }
}
