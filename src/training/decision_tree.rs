//! Decision tree implementation

use crate::error::{FlotillaError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split (all when `None`)
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    pub random_state: Option<u64>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    is_classification: bool,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self::with_task(true)
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self::with_task(false)
    }

    fn with_task(is_classification: bool) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: if is_classification { Criterion::Gini } else { Criterion::MSE },
            random_state: None,
            n_features: 0,
            feature_importances: None,
            is_classification,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(FlotillaError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        if n_samples < self.min_samples_split {
            return Err(FlotillaError::TrainingError(format!(
                "Need at least {} samples, got {}",
                self.min_samples_split, n_samples
            )));
        }

        self.n_features = n_features;

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances, &mut rng));

        // Normalize feature importances
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let y_subset: Vec<f64> = indices.iter().map(|&i| y[i]).collect();

        let should_stop = n_samples < self.min_samples_split
            || n_samples <= self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure(&y_subset);

        if should_stop {
            return TreeNode::Leaf {
                value: self.compute_leaf_value(&y_subset),
                n_samples,
            };
        }

        let candidates = self.candidate_features(x.ncols(), rng);

        match self.find_best_split(x, y, indices, &candidates) {
            Some((feature, threshold, _)) => {
                let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
                    indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

                // Weighted impurity decrease, summed per feature
                let parent_impurity = self.compute_impurity(&y_subset);
                let left_y: Vec<f64> = left_indices.iter().map(|&i| y[i]).collect();
                let right_y: Vec<f64> = right_indices.iter().map(|&i| y[i]).collect();
                let decrease = n_samples as f64 * parent_impurity
                    - left_y.len() as f64 * self.compute_impurity(&left_y)
                    - right_y.len() as f64 * self.compute_impurity(&right_y);
                importances[feature] += decrease.max(0.0);

                let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
                let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

                TreeNode::Split {
                    feature_idx: feature,
                    threshold,
                    left,
                    right,
                    n_samples,
                    impurity: parent_impurity,
                }
            }
            None => TreeNode::Leaf {
                value: self.compute_leaf_value(&y_subset),
                n_samples,
            },
        }
    }

    fn candidate_features(&self, n_features: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < n_features => sample(rng, n_features, k.max(1)).into_vec(),
            _ => (0..n_features).collect(),
        }
    }

    /// Best (feature, threshold, gain) over the candidate features
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        candidates: &[usize],
    ) -> Option<(usize, f64, f64)> {
        let y_subset: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let parent_impurity = self.compute_impurity(&y_subset);
        let n = indices.len() as f64;

        candidates
            .par_iter()
            .filter_map(|&feature_idx| {
                let mut values: Vec<f64> = indices.iter().map(|&i| x[[i, feature_idx]]).collect();
                values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                values.dedup();

                let mut best_gain = 0.0f64;
                let mut best_threshold = 0.0f64;

                for window in values.windows(2) {
                    let threshold = window[0] / 2.0 + window[1] / 2.0;

                    let mut left = SplitStats::default();
                    let mut right = SplitStats::default();
                    for &idx in indices {
                        if x[[idx, feature_idx]] <= threshold {
                            left.push(y[idx]);
                        } else {
                            right.push(y[idx]);
                        }
                    }

                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (left.count as f64 * left.impurity(self.criterion)
                        + right.count as f64 * right.impurity(self.criterion))
                        / n;

                    let gain = parent_impurity - weighted;
                    if gain > best_gain {
                        best_gain = gain;
                        best_threshold = threshold;
                    }
                }

                (best_gain > 0.0).then_some((feature_idx, best_threshold, best_gain))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .max_by(|a, b| {
                a.2.partial_cmp(&b.2)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.0.cmp(&a.0))
            })
    }

    fn compute_impurity(&self, y: &[f64]) -> f64 {
        let mut stats = SplitStats::default();
        for &v in y {
            stats.push(v);
        }
        stats.impurity(self.criterion)
    }

    fn compute_leaf_value(&self, y: &[f64]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }

        if self.is_classification {
            majority_class(y.iter().copied())
        } else {
            y.iter().sum::<f64>() / y.len() as f64
        }
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(FlotillaError::ModelNotFitted)?;

        if x.ncols() != self.n_features {
            return Err(FlotillaError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.rows().into_iter().map(|row| predict_sample(root, row)).collect())
    }

    /// Predict a single sample
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let root = self.root.as_ref().ok_or(FlotillaError::ModelNotFitted)?;
        Ok(predict_sample(root, row))
    }

    /// Normalized impurity-decrease importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, node_depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, count_leaves)
    }
}

/// Running sums for one side of a candidate split
#[derive(Default)]
struct SplitStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
    class_counts: HashMap<i64, usize>,
}

impl SplitStats {
    fn push(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        self.sq_sum += v * v;
        *self.class_counts.entry(v.round() as i64).or_insert(0) += 1;
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        match criterion {
            Criterion::Gini => {
                1.0 - self
                    .class_counts
                    .values()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -self
                .class_counts
                .values()
                .map(|&c| {
                    let p = c as f64 / n;
                    if p > 0.0 { p * p.ln() } else { 0.0 }
                })
                .sum::<f64>(),
            // Var = E[X^2] - E[X]^2
            Criterion::MSE => (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0),
        }
    }
}

/// Most frequent class code; ties go to the smallest code
pub(crate) fn majority_class(values: impl Iterator<Item = f64>) -> f64 {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for v in values {
        *counts.entry(v.round() as i64).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(class, _)| class as f64)
        .unwrap_or(0.0)
}

fn is_pure(y: &[f64]) -> bool {
    match y.first() {
        None => true,
        Some(&first) => y.iter().all(|&v| (v - first).abs() < 1e-10),
    }
}

fn predict_sample(node: &TreeNode, sample: ArrayView1<f64>) -> f64 {
    match node {
        TreeNode::Leaf { value, .. } => *value,
        TreeNode::Split { feature_idx, threshold, left, right, .. } => {
            if sample[*feature_idx] <= *threshold {
                predict_sample(left, sample)
            } else {
                predict_sample(right, sample)
            }
        }
    }
}

fn node_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
    }
}

fn count_leaves(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
    }
}
