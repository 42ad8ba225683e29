//! Feature-importance predictors
//!
//! [`FeaturePredictor`] aligns a feature table with one trait, trains a tree
//! ensemble on it and keeps the features whose importance clears a cutoff.

mod feature_predictor;
mod scores;
mod strategy;

pub use feature_predictor::{FeaturePredictor, PredictorOptions, PredictorWarning};
pub use scores::{FeatureScores, ScoreReport, SignificantFeatureSet};
pub use strategy::{CutoffStrategy, FixedCutoff, MeanPlusStd, NativeImportance, ScoringStrategy};
