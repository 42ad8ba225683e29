//! Integration test: `flotilla score` from CSV files to a JSON report

use flotilla::cli::{cmd_score, ScoreArgs};
use flotilla::predictor::ScoreReport;
use std::fs;
use std::path::PathBuf;

fn workdir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("flotilla_{}_{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_inputs(dir: &PathBuf) -> (PathBuf, PathBuf) {
    let features = dir.join("expression.csv");
    let metadata = dir.join("metadata.csv");

    let mut expression = String::from("sample_id,gene_a,gene_b,gene_c\n");
    let mut meta = String::from("sample_id,pooled,age\n");
    for i in 0..16 {
        let pooled = if i < 8 { "P" } else { "S" };
        let gene_a = if i < 8 { 0.1 * i as f64 } else { 5.0 + 0.1 * i as f64 };
        expression.push_str(&format!("s{},{:.2},{:.2},{:.2}\n", i, gene_a, (i % 3) as f64, (i % 5) as f64));
        meta.push_str(&format!("s{},{},{}\n", i, pooled, 20 + i));
    }
    // only in metadata
    meta.push_str("s99,P,70\n");

    fs::write(&features, expression).unwrap();
    fs::write(&metadata, meta).unwrap();
    (features, metadata)
}

fn args(features: PathBuf, metadata: PathBuf, trait_name: &str) -> ScoreArgs {
    ScoreArgs {
        features,
        metadata,
        trait_name: trait_name.to_string(),
        index_column: None,
        task: None,
        predictor: "extra_trees".to_string(),
        params: None,
        allow_multiclass: false,
        output: None,
    }
}

#[test]
fn test_score_writes_json_report() {
    let dir = workdir("score");
    let (features, metadata) = write_inputs(&dir);
    let output = dir.join("report.json");

    let mut score_args = args(features, metadata, "pooled");
    score_args.output = Some(output.clone());

    let result = cmd_score(&score_args);
    assert!(result.is_ok(), "score should succeed: {:?}", result.err());
    let report = result.unwrap();
    assert_eq!(report.predictor_name, "ExtraTreesClassifier");
    assert_eq!(report.subset.n_samples(), 16);

    let written: ScoreReport = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written.scores, report.scores);
    assert_eq!(written.trait_name, "pooled");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_numeric_trait_infers_regression() {
    let dir = workdir("regression");
    let (features, metadata) = write_inputs(&dir);

    let params = dir.join("params.json");
    fs::write(&params, r#"{"n_estimators": 10, "verbose": false}"#).unwrap();

    let mut score_args = args(features, metadata, "age");
    score_args.predictor = "random_forest".to_string();
    score_args.params = Some(params);

    let report = cmd_score(&score_args).unwrap();
    assert_eq!(report.predictor_name, "RandomForestRegressor");
    assert_eq!(report.scores.len(), 3);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_unknown_trait_fails() {
    let dir = workdir("missing");
    let (features, metadata) = write_inputs(&dir);

    let result = cmd_score(&args(features, metadata, "not_a_column"));
    assert!(result.is_err());

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_bad_predictor_name_fails() {
    let dir = workdir("predictor");
    let (features, metadata) = write_inputs(&dir);

    let mut score_args = args(features, metadata, "pooled");
    score_args.predictor = "svm".to_string();
    assert!(cmd_score(&score_args).is_err());

    fs::remove_dir_all(&dir).ok();
}
