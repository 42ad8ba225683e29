//! Tree ensembles used to score features
//!
//! Provides:
//! - Decision trees (CART)
//! - Random Forests with bootstrap and out-of-bag scoring
//! - Extra Trees (Extremely Randomized Trees)
//! - Gradient boosting for regression and binary classification

mod bagging;
mod config;
mod models;
pub mod decision_tree;
pub mod extra_trees;
pub mod gradient_boosting;
pub mod random_forest;

pub use config::{MaxFeatures, PredictorConfig, PredictorKind, PredictorParams, TaskType};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use extra_trees::ExtraTrees;
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingRegressor};
pub use models::{Predictor, PredictorFactory};
pub use random_forest::RandomForest;
