//! Predictor trait and factories

use super::config::{PredictorConfig, PredictorKind, TaskType};
use super::extra_trees::ExtraTrees;
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingRegressor};
use super::random_forest::RandomForest;
use crate::error::Result;
use ndarray::{Array1, Array2};
use std::fmt::Debug;

/// Trait for ensemble predictors the wrapper can score
pub trait Predictor: Send + Sync + Debug {
    /// Model name, e.g. `ExtraTreesClassifier`
    fn name(&self) -> &str;

    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Per-feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>>;

    /// Out-of-bag score (if computed)
    fn oob_score(&self) -> Option<f64> {
        None
    }
}

/// Builds an unfitted predictor for a task
pub trait PredictorFactory: Send + Sync {
    fn build(&self, task: TaskType, config: &PredictorConfig) -> Result<Box<dyn Predictor>>;

    /// Name of the model this factory builds for `task`
    fn model_name(&self, task: TaskType) -> String {
        match task {
            TaskType::Classification => "Classifier".to_string(),
            TaskType::Regression => "Regressor".to_string(),
        }
    }
}

impl<F> PredictorFactory for F
where
    F: Fn(TaskType, &PredictorConfig) -> Result<Box<dyn Predictor>> + Send + Sync,
{
    fn build(&self, task: TaskType, config: &PredictorConfig) -> Result<Box<dyn Predictor>> {
        self(task, config)
    }
}

impl PredictorFactory for PredictorKind {
    fn build(&self, task: TaskType, config: &PredictorConfig) -> Result<Box<dyn Predictor>> {
        let predictor: Box<dyn Predictor> = match (self, task) {
            (PredictorKind::ExtraTrees, _) => Box::new(ExtraTrees::from_config(task, config)),
            (PredictorKind::RandomForest, _) => Box::new(RandomForest::from_config(task, config)),
            (PredictorKind::GradientBoosting, TaskType::Classification) => {
                Box::new(GradientBoostingClassifier::from_config(config))
            }
            (PredictorKind::GradientBoosting, TaskType::Regression) => {
                Box::new(GradientBoostingRegressor::from_config(config))
            }
        };
        Ok(predictor)
    }

    fn model_name(&self, task: TaskType) -> String {
        let base = match self {
            PredictorKind::ExtraTrees => "ExtraTrees",
            PredictorKind::RandomForest => "RandomForest",
            PredictorKind::GradientBoosting => "GradientBoosting",
        };
        let suffix = match task {
            TaskType::Classification => "Classifier",
            TaskType::Regression => "Regressor",
        };
        format!("{}{}", base, suffix)
    }
}
