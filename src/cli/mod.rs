//! Flotilla CLI Module
//!
//! Command-line front end: score the features of a table against one trait.

use clap::{Args, Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{FeatureTable, TargetSeries, TargetValues};
use crate::predictor::{FeaturePredictor, PredictorOptions, ScoreReport};
use crate::training::{PredictorConfig, PredictorKind, PredictorParams, TaskType};

// ─── Styling helpers ───────────────────────────────────────────────────────────

/// Features listed in the terminal summary
const TOP_FEATURES: usize = 10;

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
    let _ = std::io::stdout().flush();
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "flotilla")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Score feature importances against a sample trait")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit a predictor on one trait and report the significant features
    Score(ScoreArgs),

    /// Print the default predictor parameters as JSON
    Defaults,
}

#[derive(Args, Debug, Clone)]
pub struct ScoreArgs {
    /// Feature table CSV (samples x features)
    #[arg(short, long)]
    pub features: PathBuf,

    /// Sample metadata CSV holding the trait
    #[arg(short, long)]
    pub metadata: PathBuf,

    /// Trait column in the metadata
    #[arg(short, long = "trait")]
    pub trait_name: String,

    /// Sample id column in both files (defaults to each file's first column)
    #[arg(long)]
    pub index_column: Option<String>,

    /// Task type (classification, regression); inferred from the trait when omitted
    #[arg(long)]
    pub task: Option<String>,

    /// Ensemble (extra_trees, random_forest, gradient_boosting)
    #[arg(short, long, default_value = "extra_trees")]
    pub predictor: String,

    /// JSON file of parameter overrides
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Accept classification traits with more than two categories
    #[arg(long)]
    pub allow_multiclass: bool,

    /// Write the score report as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

// ─── Data loading ──────────────────────────────────────────────────────────────

pub fn load_csv(path: &Path) -> anyhow::Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

fn index_column_of(df: &DataFrame, explicit: Option<&str>) -> anyhow::Result<String> {
    match explicit {
        Some(name) => Ok(name.to_string()),
        None => df
            .get_column_names()
            .first()
            .map(|c| c.to_string())
            .ok_or_else(|| anyhow::anyhow!("CSV has no columns")),
    }
}

/// Params for `score`. Fit progress goes to debug unless the params file
/// sets `verbose`, since the CLI prints its own steps.
fn score_params(args: &ScoreArgs) -> anyhow::Result<PredictorParams> {
    let mut params = match &args.params {
        Some(path) => PredictorParams::load(path)?,
        None => PredictorParams::default(),
    };
    params.verbose.get_or_insert(false);
    Ok(params)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Run `flotilla score`, returning the report that was printed
pub fn cmd_score(args: &ScoreArgs) -> anyhow::Result<ScoreReport> {
    section("Score");

    step_run("Loading features");
    let start = Instant::now();
    let feature_df = load_csv(&args.features)?;
    let feature_index = index_column_of(&feature_df, args.index_column.as_deref())?;
    let features = FeatureTable::from_dataframe(&feature_df, &feature_index)?;
    step_done(&format!(
        "{} samples × {} features in {:?}",
        features.n_samples(),
        features.n_features(),
        start.elapsed()
    ));

    step_run("Loading metadata");
    let metadata_df = load_csv(&args.metadata)?;
    let metadata_index = index_column_of(&metadata_df, args.index_column.as_deref())?;
    let target = TargetSeries::from_dataframe(&metadata_df, &metadata_index, &args.trait_name)?;
    step_done(&format!("{} samples with {}", target.len(), args.trait_name));

    let task = match args.task.as_deref() {
        Some(task) => task.parse::<TaskType>()?,
        None => match target.values() {
            TargetValues::Categorical(_) => TaskType::Classification,
            TargetValues::Numeric(_) => TaskType::Regression,
        },
    };
    let kind: PredictorKind = args.predictor.parse()?;
    let params = score_params(args)?;

    let options = PredictorOptions::new()
        .with_predictor(kind)
        .with_params(params)
        .with_allow_multiclass(args.allow_multiclass);

    let mut predictor = FeaturePredictor::new(&features, &target, task, options)?;
    for warning in predictor.warnings() {
        println!("  {} {}", "!".yellow(), warning);
    }

    step_run(&format!("Fitting {}", predictor.name().cyan()));
    let start = Instant::now();
    predictor.fit()?;
    step_done(&format!(
        "{} samples in {:?}",
        predictor.dataset().n_samples(),
        start.elapsed()
    ));

    let report = predictor.score()?.clone();
    print_report(&report);

    if let Some(path) = &args.output {
        std::fs::write(path, report.to_json()?)?;
        step_ok(&format!("Report written to {}", path.display()));
    }
    println!();

    Ok(report)
}

/// Run `flotilla defaults`
pub fn cmd_defaults() -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&PredictorConfig::default())?);
    Ok(())
}

fn print_report(report: &ScoreReport) {
    section(&format!("{} · {}", report.predictor_name, report.trait_name));
    kv("Features scored", &report.scores.len().to_string());
    kv("Cutoff", &format!("{:.6}", report.cutoff));
    kv("Good features", &report.n_good_features.to_string());
    if let Some(oob) = report.oob_score {
        kv("OOB score", &format!("{:.4}", oob));
    }

    println!();
    for (feature, score) in report.ranked().into_iter().take(TOP_FEATURES) {
        let marker = if report.significant.contains(feature) {
            ok("●")
        } else {
            dim("○")
        };
        println!("  {} {:<32} {}", marker, feature, format!("{:.6}", score).white());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score_args(params: Option<PathBuf>) -> ScoreArgs {
        ScoreArgs {
            features: PathBuf::from("f.csv"),
            metadata: PathBuf::from("m.csv"),
            trait_name: "pooled".to_string(),
            index_column: None,
            task: None,
            predictor: "extra_trees".to_string(),
            params,
            allow_multiclass: false,
            output: None,
        }
    }

    #[test]
    fn test_score_params_quiet_by_default() {
        let params = score_params(&score_args(None)).unwrap();
        assert_eq!(params.verbose, Some(false));

        let path = std::env::temp_dir().join(format!("flotilla_verbose_{}.json", std::process::id()));
        std::fs::write(&path, r#"{"verbose": true}"#).unwrap();
        let params = score_params(&score_args(Some(path.clone()))).unwrap();
        assert_eq!(params.verbose, Some(true));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_parse_score_command() {
        let cli = Cli::try_parse_from([
            "flotilla", "score", "--features", "f.csv", "--metadata", "m.csv", "--trait", "pooled",
            "--predictor", "random_forest", "--allow-multiclass",
        ])
        .unwrap();

        match cli.command {
            Commands::Score(args) => {
                assert_eq!(args.trait_name, "pooled");
                assert_eq!(args.predictor, "random_forest");
                assert!(args.allow_multiclass);
                assert!(args.task.is_none());
            }
            Commands::Defaults => panic!("expected score"),
        }
    }

    #[test]
    fn test_trait_is_required() {
        let result = Cli::try_parse_from(["flotilla", "score", "--features", "f.csv", "--metadata", "m.csv"]);
        assert!(result.is_err());
    }
}
