//! Importance scores and the significant subset derived from them

use crate::data::FeatureTable;
use crate::error::{FlotillaError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// One importance score per feature, in feature-table column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScores {
    features: Vec<String>,
    scores: Array1<f64>,
}

impl FeatureScores {
    pub fn new(features: Vec<String>, scores: Array1<f64>) -> Result<Self> {
        if features.len() != scores.len() {
            return Err(FlotillaError::ShapeError {
                expected: format!("{} scores", features.len()),
                actual: format!("{} scores", scores.len()),
            });
        }
        Ok(Self { features, scores })
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.scores
    }

    /// Score of a single feature
    pub fn get(&self, feature: &str) -> Option<f64> {
        self.features
            .iter()
            .position(|f| f == feature)
            .map(|i| self.scores[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.features
            .iter()
            .map(String::as_str)
            .zip(self.scores.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Features whose score lies strictly above the cutoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificantFeatureSet {
    mask: Vec<bool>,
    features: Vec<String>,
}

impl SignificantFeatureSet {
    pub fn from_scores(scores: &FeatureScores, cutoff: f64) -> Self {
        let mask: Vec<bool> = scores.values().iter().map(|&s| s > cutoff).collect();
        let features = scores
            .features()
            .iter()
            .zip(&mask)
            .filter(|(_, &keep)| keep)
            .map(|(f, _)| f.clone())
            .collect();
        Self { mask, features }
    }

    /// One flag per scored feature
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Significant feature ids, in column order
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Everything `score()` produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub predictor_name: String,
    pub trait_name: String,
    pub scores: FeatureScores,
    pub cutoff: f64,
    pub significant: SignificantFeatureSet,
    pub n_good_features: usize,
    /// Aligned features restricted to the significant columns
    pub subset: FeatureTable,
    pub oob_score: Option<f64>,
}

impl ScoreReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Features ranked by descending score
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self.scores.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}
