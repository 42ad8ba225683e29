//! Predictor configuration

use crate::error::{FlotillaError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Kind of response variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Continuous trait
    Regression,
    /// Categorical trait
    Classification,
}

impl TaskType {
    pub fn is_classification(&self) -> bool {
        matches!(self, TaskType::Classification)
    }
}

impl FromStr for TaskType {
    type Err = FlotillaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "regression" | "regressor" => Ok(TaskType::Regression),
            "classification" | "classifier" => Ok(TaskType::Classification),
            _ => Err(FlotillaError::InvalidParameter {
                name: "task".to_string(),
                value: s.to_string(),
                reason: "expected classification or regression".to_string(),
            }),
        }
    }
}

/// Number of features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// sqrt(n_features) for classifiers, all features for regressors
    Auto,
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number, capped at n_features
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    /// Resolve to a concrete feature count in `1..=n_features`
    pub fn resolve(&self, n_features: usize, is_classification: bool) -> usize {
        let n = n_features as f64;
        let k = match self {
            MaxFeatures::Auto if is_classification => n.sqrt().ceil() as usize,
            MaxFeatures::Auto => n_features,
            MaxFeatures::Sqrt => n.sqrt().ceil() as usize,
            MaxFeatures::Log2 => n.log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n * f).ceil() as usize,
            MaxFeatures::Fixed(k) => *k,
            MaxFeatures::All => n_features,
        };
        k.clamp(1, n_features.max(1))
    }
}

impl FromStr for MaxFeatures {
    type Err = FlotillaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(MaxFeatures::Auto),
            "sqrt" => Ok(MaxFeatures::Sqrt),
            "log2" => Ok(MaxFeatures::Log2),
            "all" | "none" => Ok(MaxFeatures::All),
            other => {
                let invalid = || FlotillaError::InvalidParameter {
                    name: "max_features".to_string(),
                    value: s.to_string(),
                    reason: "expected auto, sqrt, log2, all, a count or a fraction".to_string(),
                };
                if let Ok(k) = other.parse::<usize>() {
                    Ok(MaxFeatures::Fixed(k))
                } else {
                    match other.parse::<f64>() {
                        Ok(f) if f > 0.0 && f <= 1.0 => Ok(MaxFeatures::Fraction(f)),
                        _ => Err(invalid()),
                    }
                }
            }
        }
    }
}

/// Ensemble used to score features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorKind {
    /// Extremely randomized trees
    #[default]
    ExtraTrees,
    /// Bagged CART trees
    RandomForest,
    /// Gradient boosted trees
    GradientBoosting,
}

impl FromStr for PredictorKind {
    type Err = FlotillaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "extra_trees" | "extratrees" => Ok(PredictorKind::ExtraTrees),
            "random_forest" | "randomforest" => Ok(PredictorKind::RandomForest),
            "gradient_boosting" | "boosting" => Ok(PredictorKind::GradientBoosting),
            _ => Err(FlotillaError::InvalidParameter {
                name: "predictor".to_string(),
                value: s.to_string(),
                reason: "expected extra_trees, random_forest or gradient_boosting".to_string(),
            }),
        }
    }
}

/// Resolved hyperparameters handed to an ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Number of trees (boosting rounds for gradient boosting)
    pub n_estimators: usize,
    /// Train each tree on a bootstrap sample
    pub bootstrap: bool,
    /// Features considered per split
    pub max_features: MaxFeatures,
    /// Random seed (`None` draws from entropy)
    pub random_state: Option<u64>,
    /// Compute the out-of-bag score (needs `bootstrap`)
    pub oob_score: bool,
    /// Worker threads for training (`None` = all cores)
    pub n_jobs: Option<usize>,
    /// Log progress at info level
    pub verbose: bool,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples in a leaf
    pub min_samples_leaf: usize,
    /// Shrinkage (gradient boosting)
    pub learning_rate: f64,
    /// Row subsample ratio per boosting round
    pub subsample: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            bootstrap: true,
            max_features: MaxFeatures::Auto,
            random_state: Some(0),
            oob_score: true,
            n_jobs: Some(2),
            verbose: true,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            learning_rate: 0.1,
            subsample: 1.0,
        }
    }
}

impl PredictorConfig {
    /// Defaults with `params` laid over them
    pub fn from_params(params: &PredictorParams) -> Result<Self> {
        Self::default().merged(params)
    }

    /// Apply every override that is set in `params`
    pub fn merged(mut self, params: &PredictorParams) -> Result<Self> {
        if let Some(v) = params.n_estimators {
            self.n_estimators = v;
        }
        if let Some(v) = params.bootstrap {
            self.bootstrap = v;
        }
        if let Some(v) = params.max_features {
            self.max_features = v;
        }
        if let Some(v) = params.random_state {
            self.random_state = Some(v);
        }
        if let Some(v) = params.oob_score {
            self.oob_score = v;
        }
        if let Some(v) = params.n_jobs {
            self.n_jobs = (v > 0).then_some(v);
        }
        if let Some(v) = params.verbose {
            self.verbose = v;
        }
        if let Some(v) = params.max_depth {
            self.max_depth = Some(v);
        }
        if let Some(v) = params.min_samples_split {
            self.min_samples_split = v;
        }
        if let Some(v) = params.min_samples_leaf {
            self.min_samples_leaf = v;
        }
        if let Some(v) = params.learning_rate {
            self.learning_rate = v;
        }
        if let Some(v) = params.subsample {
            self.subsample = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| FlotillaError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };

        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", "0".into(), "must be at least 1"));
        }
        if self.min_samples_split < 2 {
            return Err(invalid(
                "min_samples_split",
                self.min_samples_split.to_string(),
                "must be at least 2",
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(invalid("min_samples_leaf", "0".into(), "must be at least 1"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(invalid("learning_rate", self.learning_rate.to_string(), "must be positive"));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(invalid("subsample", self.subsample.to_string(), "must be in (0, 1]"));
        }
        if let MaxFeatures::Fraction(f) = self.max_features {
            if !(f > 0.0 && f <= 1.0) {
                return Err(invalid("max_features", f.to_string(), "fraction must be in (0, 1]"));
            }
        }
        Ok(())
    }
}

/// Optional overrides for [`PredictorConfig`]; unset fields keep the default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PredictorParams {
    pub n_estimators: Option<usize>,
    pub bootstrap: Option<bool>,
    pub max_features: Option<MaxFeatures>,
    pub random_state: Option<u64>,
    pub oob_score: Option<bool>,
    /// `0` means all cores
    pub n_jobs: Option<usize>,
    pub verbose: Option<bool>,
    pub max_depth: Option<usize>,
    pub min_samples_split: Option<usize>,
    pub min_samples_leaf: Option<usize>,
    pub learning_rate: Option<f64>,
    pub subsample: Option<f64>,
}

impl PredictorParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides used for boosting classifiers
    pub fn boosting_preset() -> Self {
        Self {
            n_estimators: Some(80),
            max_features: Some(MaxFeatures::Fixed(1000)),
            learning_rate: Some(0.2),
            subsample: Some(0.6),
            ..Default::default()
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = Some(n);
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_oob_score(mut self, oob_score: bool) -> Self {
        self.oob_score = Some(oob_score);
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Parse overrides from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| FlotillaError::ConfigError(format!("invalid predictor params: {}", e)))
    }

    /// Load overrides from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PredictorConfig::default();
        assert_eq!(config.n_estimators, 100);
        assert!(config.bootstrap);
        assert_eq!(config.max_features, MaxFeatures::Auto);
        assert_eq!(config.random_state, Some(0));
        assert!(config.oob_score);
        assert_eq!(config.n_jobs, Some(2));
        assert!(config.verbose);
    }

    #[test]
    fn test_merge_overrides_only_set_fields() {
        let params = PredictorParams::new().with_n_estimators(10).with_verbose(false);
        let config = PredictorConfig::from_params(&params).unwrap();
        assert_eq!(config.n_estimators, 10);
        assert!(!config.verbose);
        assert_eq!(config.random_state, Some(0));
        assert!(config.bootstrap);
    }

    #[test]
    fn test_merge_rejects_invalid() {
        let params = PredictorParams::new().with_n_estimators(0);
        assert!(PredictorConfig::from_params(&params).is_err());
    }

    #[test]
    fn test_params_from_json() {
        let params = PredictorParams::from_json(r#"{"n_estimators": 25, "max_features": "sqrt"}"#).unwrap();
        assert_eq!(params.n_estimators, Some(25));
        assert_eq!(params.max_features, Some(MaxFeatures::Sqrt));
        assert_eq!(params.bootstrap, None);

        let fixed = PredictorParams::from_json(r#"{"max_features": {"fixed": 1000}}"#).unwrap();
        assert_eq!(fixed.max_features, Some(MaxFeatures::Fixed(1000)));

        assert!(PredictorParams::from_json(r#"{"n_trees": 3}"#).is_err());
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::Auto.resolve(100, true), 10);
        assert_eq!(MaxFeatures::Auto.resolve(100, false), 100);
        assert_eq!(MaxFeatures::Fixed(1000).resolve(5, true), 5);
        assert_eq!(MaxFeatures::Fraction(0.25).resolve(10, false), 3);
        assert_eq!(MaxFeatures::Log2.resolve(1, true), 1);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("random-forest".parse::<PredictorKind>().unwrap(), PredictorKind::RandomForest);
        assert_eq!("Classification".parse::<TaskType>().unwrap(), TaskType::Classification);
        assert_eq!("0.5".parse::<MaxFeatures>().unwrap(), MaxFeatures::Fraction(0.5));
        assert_eq!("1000".parse::<MaxFeatures>().unwrap(), MaxFeatures::Fixed(1000));
        assert!("lots".parse::<MaxFeatures>().is_err());
    }
}
