//! Scoring and cutoff strategies

use crate::error::{FlotillaError, Result};
use crate::training::Predictor;
use ndarray::{Array1, ArrayView1};

/// Turns a fitted predictor into one score per feature
pub trait ScoringStrategy: Send + Sync {
    fn score(&self, predictor: &dyn Predictor) -> Result<Array1<f64>>;
}

/// Uses the model's own feature importances
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeImportance;

impl ScoringStrategy for NativeImportance {
    fn score(&self, predictor: &dyn Predictor) -> Result<Array1<f64>> {
        predictor.feature_importances().ok_or_else(|| {
            FlotillaError::ComputationError(format!(
                "{} does not expose feature importances",
                predictor.name()
            ))
        })
    }
}

impl<F> ScoringStrategy for F
where
    F: Fn(&dyn Predictor) -> Result<Array1<f64>> + Send + Sync,
{
    fn score(&self, predictor: &dyn Predictor) -> Result<Array1<f64>> {
        self(predictor)
    }
}

/// Derives the significance threshold from a set of scores
pub trait CutoffStrategy: Send + Sync {
    fn cutoff(&self, scores: ArrayView1<f64>) -> f64;
}

/// `mean + n_std * std`, population standard deviation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanPlusStd {
    pub n_std: f64,
}

impl Default for MeanPlusStd {
    fn default() -> Self {
        Self { n_std: 2.0 }
    }
}

impl CutoffStrategy for MeanPlusStd {
    fn cutoff(&self, scores: ArrayView1<f64>) -> f64 {
        match scores.mean() {
            Some(mean) => mean + self.n_std * scores.std(0.0),
            None => f64::NAN,
        }
    }
}

/// A constant threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCutoff(pub f64);

impl CutoffStrategy for FixedCutoff {
    fn cutoff(&self, _scores: ArrayView1<f64>) -> f64 {
        self.0
    }
}

impl<F> CutoffStrategy for F
where
    F: Fn(ArrayView1<f64>) -> f64 + Send + Sync,
{
    fn cutoff(&self, scores: ArrayView1<f64>) -> f64 {
        self(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mean_plus_two_std() {
        let scores = array![1.0, 2.0, 3.0, 4.0];
        // mean 2.5, population std sqrt(1.25)
        let expected = 2.5 + 2.0 * 1.25f64.sqrt();
        assert!((MeanPlusStd::default().cutoff(scores.view()) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_equal_scores_select_nothing() {
        let scores = array![0.2, 0.2, 0.2, 0.2, 0.2];
        let cutoff = MeanPlusStd::default().cutoff(scores.view());
        assert!((cutoff - 0.2).abs() < 1e-12);
        assert_eq!(scores.iter().filter(|&&s| s > cutoff).count(), 0);
    }

    #[test]
    fn test_closure_cutoff() {
        fn median(s: ArrayView1<f64>) -> f64 {
            let mut v = s.to_vec();
            v.sort_by(|a, b| a.total_cmp(b));
            v[v.len() / 2]
        }
        assert_eq!(median.cutoff(array![3.0, 1.0, 2.0].view()), 2.0);
        assert_eq!(FixedCutoff(0.1).cutoff(array![5.0].view()), 0.1);
    }
}
