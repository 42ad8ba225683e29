//! Feature-importance predictor for a single trait

use super::scores::{FeatureScores, ScoreReport, SignificantFeatureSet};
use super::strategy::{CutoffStrategy, MeanPlusStd, NativeImportance, ScoringStrategy};
use crate::data::{AlignedDataset, FeatureTable, TargetSeries, TargetValues};
use crate::error::{FlotillaError, Result};
use crate::preprocessing::LabelEncoder;
use crate::training::{
    Predictor, PredictorConfig, PredictorFactory, PredictorKind, PredictorParams, TaskType,
};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Non-fatal conditions noticed while preparing the data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredictorWarning {
    /// Classification trait with more than two categories
    MultiClass {
        trait_name: String,
        n_categories: usize,
    },
}

impl fmt::Display for PredictorWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictorWarning::MultiClass { trait_name, n_categories } => write!(
                f,
                "trait \"{}\" has {} categories; importances come from a multi-class fit",
                trait_name, n_categories
            ),
        }
    }
}

/// How a [`FeaturePredictor`] trains and scores
pub struct PredictorOptions {
    factory: Box<dyn PredictorFactory>,
    params: PredictorParams,
    scoring: Box<dyn ScoringStrategy>,
    cutoff: Box<dyn CutoffStrategy>,
    name: Option<String>,
    allow_multiclass: bool,
}

impl Default for PredictorOptions {
    fn default() -> Self {
        Self {
            factory: Box::new(PredictorKind::default()),
            params: PredictorParams::default(),
            scoring: Box::new(NativeImportance),
            cutoff: Box::new(MeanPlusStd::default()),
            name: None,
            allow_multiclass: false,
        }
    }
}

impl fmt::Debug for PredictorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictorOptions")
            .field("params", &self.params)
            .field("name", &self.name)
            .field("allow_multiclass", &self.allow_multiclass)
            .finish_non_exhaustive()
    }
}

impl PredictorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use one of the built-in ensembles
    pub fn with_predictor(mut self, kind: PredictorKind) -> Self {
        self.factory = Box::new(kind);
        self
    }

    /// Use a custom predictor constructor
    pub fn with_factory(mut self, factory: impl PredictorFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    /// Hyperparameter overrides, laid over the defaults
    pub fn with_params(mut self, params: PredictorParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_scoring(mut self, scoring: impl ScoringStrategy + 'static) -> Self {
        self.scoring = Box::new(scoring);
        self
    }

    pub fn with_cutoff(mut self, cutoff: impl CutoffStrategy + 'static) -> Self {
        self.cutoff = Box::new(cutoff);
        self
    }

    /// Display name; defaults to the model name, e.g. `ExtraTreesClassifier`
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Accept classification traits with more than two categories
    pub fn with_allow_multiclass(mut self, allow: bool) -> Self {
        self.allow_multiclass = allow;
        self
    }
}

/// Trains an ensemble on one trait and picks out the features it relies on.
///
/// Features and trait are inner-joined on sample id when the predictor is
/// built. [`fit`](Self::fit) trains the model; [`score`](Self::score) reads
/// its importances and keeps the features scoring above the cutoff
/// (`mean + 2 * std` unless configured otherwise).
pub struct FeaturePredictor {
    name: String,
    task: TaskType,
    dataset: AlignedDataset,
    response: Array1<f64>,
    classes: Option<Vec<String>>,
    config: PredictorConfig,
    factory: Box<dyn PredictorFactory>,
    scoring: Box<dyn ScoringStrategy>,
    cutoff: Box<dyn CutoffStrategy>,
    warnings: Vec<PredictorWarning>,
    model: Option<Box<dyn Predictor>>,
    report: Option<ScoreReport>,
}

impl fmt::Debug for FeaturePredictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeaturePredictor")
            .field("name", &self.name)
            .field("task", &self.task)
            .field("trait_name", &self.trait_name())
            .field("n_samples", &self.dataset.n_samples())
            .field("n_features", &self.dataset.features().n_features())
            .field("has_been_fit", &self.has_been_fit())
            .field("has_been_scored", &self.has_been_scored())
            .finish_non_exhaustive()
    }
}

macro_rules! progress {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

impl FeaturePredictor {
    /// Align `features` with `target` and prepare the response for `task`
    pub fn new(
        features: &FeatureTable,
        target: &TargetSeries,
        task: TaskType,
        options: PredictorOptions,
    ) -> Result<Self> {
        let PredictorOptions {
            factory,
            params,
            scoring,
            cutoff,
            name,
            allow_multiclass,
        } = options;

        let config = PredictorConfig::from_params(&params)?;
        let name = name.unwrap_or_else(|| factory.model_name(task));
        progress!(config.verbose, "Initializing predictor for {}", target.name());

        if features.n_features() == 0 {
            return Err(FlotillaError::DataError(
                "feature table has no columns to score".to_string(),
            ));
        }

        let dataset = AlignedDataset::align(features, target)?;
        let trait_name = dataset.target().name().to_string();
        let mut warnings = Vec::new();

        let (response, classes) = match task {
            TaskType::Regression => match dataset.target().values() {
                TargetValues::Numeric(values) => (Array1::from_vec(values.clone()), None),
                TargetValues::Categorical(_) => {
                    return Err(FlotillaError::DataError(format!(
                        "regression needs a numeric trait, \"{}\" is categorical",
                        trait_name
                    )))
                }
            },
            TaskType::Classification => {
                let (codes, classes) = match dataset.target().values() {
                    TargetValues::Numeric(values) => encode(values.as_slice())?,
                    TargetValues::Categorical(values) => encode(values.as_slice())?,
                };

                let n_categories = classes.len();
                if n_categories < 2 {
                    return Err(FlotillaError::DegenerateTarget {
                        trait_name,
                        n_categories,
                    });
                }
                if n_categories > 2 {
                    if !allow_multiclass {
                        return Err(FlotillaError::MultiClassTarget {
                            trait_name,
                            n_categories,
                        });
                    }
                    let warning = PredictorWarning::MultiClass {
                        trait_name: trait_name.clone(),
                        n_categories,
                    };
                    warn!("{}", warning);
                    warnings.push(warning);
                }
                (codes, Some(classes))
            }
        };

        Ok(Self {
            name,
            task,
            dataset,
            response,
            classes,
            config,
            factory,
            scoring,
            cutoff,
            warnings,
            model: None,
            report: None,
        })
    }

    /// Predictor for a continuous trait
    pub fn regressor(
        features: &FeatureTable,
        target: &TargetSeries,
        options: PredictorOptions,
    ) -> Result<Self> {
        Self::new(features, target, TaskType::Regression, options)
    }

    /// Predictor for a categorical trait
    pub fn classifier(
        features: &FeatureTable,
        target: &TargetSeries,
        options: PredictorOptions,
    ) -> Result<Self> {
        Self::new(features, target, TaskType::Classification, options)
    }

    /// Train the model on the aligned data.
    ///
    /// Fitting again replaces the model and discards the previous report.
    /// A failed fit leaves the predictor as it was.
    pub fn fit(&mut self) -> Result<&mut Self> {
        progress!(
            self.config.verbose,
            "Fitting a predictor for trait {} using {} features ({} samples)",
            self.trait_name(),
            self.dataset.features().n_features(),
            self.dataset.n_samples()
        );

        let mut model = self.factory.build(self.task, &self.config)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.n_jobs.unwrap_or(0))
            .build()
            .map_err(|e| FlotillaError::ThreadPoolError(e.to_string()))?;

        let x = self.dataset.features().values();
        let y = &self.response;
        pool.install(|| model.fit(x, y))?;

        if self.model.is_some() {
            warn!(
                "Refitting {} for trait {}; previous scores discarded",
                self.name,
                self.trait_name()
            );
        }
        self.model = Some(model);
        self.report = None;

        progress!(self.config.verbose, "\tDone fitting {}", self.name);
        Ok(self)
    }

    /// Score the fitted model's features and select the significant ones
    pub fn score(&mut self) -> Result<&ScoreReport> {
        let model = self.model.as_deref().ok_or(FlotillaError::ModelNotFitted)?;

        progress!(
            self.config.verbose,
            "Scoring predictor: {} for trait: {}",
            self.name,
            self.trait_name()
        );

        let features = self.dataset.features();
        let raw = self.scoring.score(model)?;
        if raw.len() != features.n_features() {
            return Err(FlotillaError::ShapeError {
                expected: format!("{} feature scores", features.n_features()),
                actual: format!("{} feature scores", raw.len()),
            });
        }

        let cutoff = self.cutoff.cutoff(raw.view());
        let scores = FeatureScores::new(features.columns().to_vec(), raw)?;
        let significant = SignificantFeatureSet::from_scores(&scores, cutoff);
        let subset = features.select_columns(significant.mask())?;

        let report = ScoreReport {
            predictor_name: self.name.clone(),
            trait_name: self.trait_name().to_string(),
            n_good_features: significant.len(),
            scores,
            cutoff,
            significant,
            subset,
            oob_score: model.oob_score(),
        };

        progress!(
            self.config.verbose,
            "\t{} of {} features above cutoff {:.6}",
            report.n_good_features,
            report.scores.len(),
            report.cutoff
        );

        Ok(&*self.report.insert(report))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trait_name(&self) -> &str {
        self.dataset.target().name()
    }

    pub fn task(&self) -> TaskType {
        self.task
    }

    /// Features and trait after alignment
    pub fn dataset(&self) -> &AlignedDataset {
        &self.dataset
    }

    /// Training response: class codes for classification, raw values otherwise
    pub fn response(&self) -> &Array1<f64> {
        &self.response
    }

    /// Class labels in code order (classification only)
    pub fn classes(&self) -> Option<&[String]> {
        self.classes.as_deref()
    }

    pub fn warnings(&self) -> &[PredictorWarning] {
        &self.warnings
    }

    /// Resolved hyperparameters
    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn model(&self) -> Option<&dyn Predictor> {
        self.model.as_deref()
    }

    pub fn report(&self) -> Option<&ScoreReport> {
        self.report.as_ref()
    }

    pub fn scores(&self) -> Option<&FeatureScores> {
        self.report.as_ref().map(|r| &r.scores)
    }

    pub fn cutoff(&self) -> Option<f64> {
        self.report.as_ref().map(|r| r.cutoff)
    }

    /// Significant feature ids from the last score
    pub fn important_features(&self) -> Option<&[String]> {
        self.report.as_ref().map(|r| r.significant.features())
    }

    pub fn n_good_features(&self) -> Option<usize> {
        self.report.as_ref().map(|r| r.n_good_features)
    }

    pub fn subset(&self) -> Option<&FeatureTable> {
        self.report.as_ref().map(|r| &r.subset)
    }

    pub fn oob_score(&self) -> Option<f64> {
        self.model.as_ref().and_then(|m| m.oob_score())
    }

    pub fn has_been_fit(&self) -> bool {
        self.model.is_some()
    }

    pub fn has_been_scored(&self) -> bool {
        self.report.is_some()
    }
}

/// Label-encode `labels`, returning codes and the class names in code order
fn encode<T>(labels: &[T]) -> Result<(Array1<f64>, Vec<String>)>
where
    T: Clone + PartialOrd + fmt::Debug + ToString,
{
    let encoder = LabelEncoder::fit(labels)?;
    let codes = encoder
        .transform(labels)?
        .into_iter()
        .map(|c| c as f64)
        .collect();
    let classes = encoder.classes().iter().map(ToString::to_string).collect();
    Ok((codes, classes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn table(n: usize) -> FeatureTable {
        FeatureTable::new(
            (0..n).map(|i| format!("s{}", i)).collect(),
            vec!["a".into(), "b".into()],
            Array2::from_shape_fn((n, 2), |(i, j)| (i * (j + 1)) as f64),
        )
        .unwrap()
    }

    fn quiet() -> PredictorOptions {
        PredictorOptions::new().with_params(PredictorParams::new().with_n_estimators(5).with_verbose(false))
    }

    #[test]
    fn test_numeric_classes_sorted_numerically() {
        let target = TargetSeries::numeric(
            "grade",
            (0..4).map(|i| format!("s{}", i)).collect(),
            vec![10.0, 2.0, 10.0, 2.0],
        )
        .unwrap();
        let predictor = FeaturePredictor::classifier(&table(4), &target, quiet()).unwrap();
        assert_eq!(predictor.classes().unwrap(), &["2".to_string(), "10".to_string()]);
        assert_eq!(predictor.response().to_vec(), vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_default_name_follows_factory() {
        let target = TargetSeries::numeric("age", (0..4).map(|i| format!("s{}", i)).collect(), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let predictor = FeaturePredictor::regressor(&table(4), &target, quiet()).unwrap();
        assert_eq!(predictor.name(), "ExtraTreesRegressor");

        let named = FeaturePredictor::regressor(&table(4), &target, quiet().with_name("age model")).unwrap();
        assert_eq!(named.name(), "age model");
    }

    #[test]
    fn test_no_columns_rejected() {
        let empty = FeatureTable::new(vec!["s0".into()], Vec::new(), Array2::zeros((1, 0))).unwrap();
        let target = TargetSeries::numeric("age", vec!["s0".into()], vec![1.0]).unwrap();
        let result = FeaturePredictor::regressor(&empty, &target, quiet());
        assert!(matches!(result, Err(FlotillaError::DataError(_))));
    }

    #[test]
    fn test_failed_refit_keeps_state() {
        let target = TargetSeries::numeric("age", (0..4).map(|i| format!("s{}", i)).collect(), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let mut predictor = FeaturePredictor::regressor(&table(4), &target, quiet()).unwrap();
        predictor.fit().unwrap();
        predictor.score().unwrap();

        predictor.factory = Box::new(|_: TaskType, _: &PredictorConfig| -> Result<Box<dyn Predictor>> {
            Err(FlotillaError::TrainingError("boom".into()))
        });
        assert!(matches!(predictor.fit(), Err(FlotillaError::TrainingError(_))));
        assert!(predictor.has_been_fit());
        assert!(predictor.has_been_scored());
    }
}
