//! Bootstrap sampling and out-of-bag scoring shared by the tree ensembles

use super::decision_tree::majority_class;
use ndarray::Array1;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Rows a single tree is trained on, and the rows it never saw
#[derive(Debug, Clone)]
pub(crate) struct BootstrapSample {
    pub in_bag: Vec<usize>,
    pub out_of_bag: Vec<usize>,
}

impl BootstrapSample {
    /// Draw `n_samples` rows with replacement
    pub fn draw(n_samples: usize, rng: &mut ChaCha8Rng) -> Self {
        let mut seen = vec![false; n_samples];
        let in_bag: Vec<usize> = (0..n_samples)
            .map(|_| {
                let idx = rng.gen_range(0..n_samples);
                seen[idx] = true;
                idx
            })
            .collect();
        let out_of_bag = (0..n_samples).filter(|&i| !seen[i]).collect();
        Self { in_bag, out_of_bag }
    }

    /// Every row once, nothing out of bag
    pub fn full(n_samples: usize) -> Self {
        Self {
            in_bag: (0..n_samples).collect(),
            out_of_bag: Vec::new(),
        }
    }
}

/// Collects out-of-bag predictions per sample across trees
#[derive(Debug, Clone)]
pub(crate) struct OobAccumulator {
    predictions: Vec<Vec<f64>>,
}

impl OobAccumulator {
    pub fn new(n_samples: usize) -> Self {
        Self {
            predictions: vec![Vec::new(); n_samples],
        }
    }

    pub fn add(&mut self, sample: usize, prediction: f64) {
        self.predictions[sample].push(prediction);
    }

    /// Accuracy (classification) or R^2 (regression) over the samples that
    /// were out of bag at least once. `None` when no sample ever was.
    pub fn score(&self, y: &Array1<f64>, is_classification: bool) -> Option<f64> {
        let pairs: Vec<(f64, f64)> = self
            .predictions
            .iter()
            .enumerate()
            .filter(|(_, preds)| !preds.is_empty())
            .map(|(i, preds)| {
                let aggregate = if is_classification {
                    majority_class(preds.iter().copied())
                } else {
                    preds.iter().sum::<f64>() / preds.len() as f64
                };
                (y[i], aggregate)
            })
            .collect();

        if pairs.is_empty() {
            return None;
        }

        let n = pairs.len() as f64;
        if is_classification {
            let correct = pairs.iter().filter(|(t, p)| (t - p).abs() < 0.5).count();
            Some(correct as f64 / n)
        } else {
            let mean = pairs.iter().map(|(t, _)| t).sum::<f64>() / n;
            let ss_tot: f64 = pairs.iter().map(|(t, _)| (t - mean).powi(2)).sum();
            let ss_res: f64 = pairs.iter().map(|(t, p)| (t - p).powi(2)).sum();
            Some(if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 })
        }
    }
}

/// Average per-tree importances and renormalize to sum 1
pub(crate) fn mean_importances<'a>(
    per_tree: impl Iterator<Item = &'a Array1<f64>>,
    n_features: usize,
) -> Array1<f64> {
    let mut total = Array1::<f64>::zeros(n_features);
    let mut n_trees = 0usize;
    for imp in per_tree {
        total += imp;
        n_trees += 1;
    }
    if n_trees > 0 {
        total /= n_trees as f64;
    }
    let sum = total.sum();
    if sum > 0.0 {
        total /= sum;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_bootstrap_partition() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let sample = BootstrapSample::draw(50, &mut rng);
        assert_eq!(sample.in_bag.len(), 50);
        for i in &sample.out_of_bag {
            assert!(!sample.in_bag.contains(i));
        }
        // with replacement, some rows are left out
        assert!(!sample.out_of_bag.is_empty());
    }

    #[test]
    fn test_oob_accuracy() {
        let y = array![0.0, 1.0, 1.0];
        let mut oob = OobAccumulator::new(3);
        oob.add(0, 0.0);
        oob.add(1, 0.0);
        oob.add(1, 1.0);
        oob.add(1, 1.0);
        assert_eq!(oob.score(&y, true), Some(1.0));
    }

    #[test]
    fn test_oob_empty() {
        let oob = OobAccumulator::new(2);
        assert_eq!(oob.score(&array![1.0, 2.0], false), None);
    }

    #[test]
    fn test_mean_importances() {
        let a = array![1.0, 0.0];
        let b = array![0.0, 0.0];
        let mean = mean_importances([&a, &b].into_iter(), 2);
        assert_eq!(mean, array![1.0, 0.0]);
    }
}
