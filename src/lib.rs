//! Flotilla - feature-importance predictors for sample traits
//!
//! Given a samples x features table (expression, splicing, ...) and one
//! sample trait, flotilla trains a tree ensemble, reads its feature
//! importances and keeps the features scoring above `mean + 2 * std`.
//!
//! # Modules
//!
//! - [`data`] - Feature tables, trait series and their inner-join alignment
//! - [`preprocessing`] - Label encoding of categorical traits
//! - [`training`] - Decision trees, Random Forest, Extra Trees, gradient boosting
//! - [`predictor`] - The feature-importance predictor and its strategies
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use flotilla::prelude::*;
//! use ndarray::array;
//!
//! let samples: Vec<String> = (0..4).map(|i| format!("s{}", i)).collect();
//! let features = FeatureTable::new(
//!     samples.clone(),
//!     vec!["gene_a".into(), "gene_b".into()],
//!     array![[0.1, 5.0], [0.2, 4.0], [3.1, 5.5], [3.3, 4.2]],
//! )?;
//! let target = TargetSeries::categorical("pooled", samples, vec!["P", "P", "S", "S"])?;
//!
//! let mut predictor = FeaturePredictor::classifier(&features, &target, PredictorOptions::default())?;
//! let report = predictor.fit()?.score()?;
//! println!("{:?}", report.significant.features());
//! # Ok::<(), flotilla::error::FlotillaError>(())
//! ```

// Core error handling
pub mod error;

pub mod data;
pub mod preprocessing;
pub mod training;
pub mod predictor;

pub mod cli;

/// Prelude for common imports
pub mod prelude {
    pub use crate::data::{AlignedDataset, FeatureTable, TargetSeries, TargetValues};
    pub use crate::error::{FlotillaError, Result};
    pub use crate::predictor::{
        CutoffStrategy, FeaturePredictor, FixedCutoff, MeanPlusStd, NativeImportance,
        PredictorOptions, PredictorWarning, ScoreReport, ScoringStrategy,
    };
    pub use crate::preprocessing::LabelEncoder;
    pub use crate::training::{
        MaxFeatures, Predictor, PredictorConfig, PredictorFactory, PredictorKind, PredictorParams,
        TaskType,
    };
}
