use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flotilla::prelude::*;
use ndarray::Array2;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_expression_data(n_samples: usize, n_features: usize) -> (FeatureTable, TargetSeries) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let samples: Vec<String> = (0..n_samples).map(|i| format!("sample_{}", i)).collect();
    let genes: Vec<String> = (0..n_features).map(|i| format!("gene_{}", i)).collect();

    let values = Array2::from_shape_simple_fn((n_samples, n_features), || rng.gen::<f64>() * 10.0);
    // first gene drives the phenotype
    let labels: Vec<&str> = (0..n_samples)
        .map(|i| if values[[i, 0]] > 5.0 { "case" } else { "control" })
        .collect();

    let features = FeatureTable::new(samples.clone(), genes, values).unwrap();
    let target = TargetSeries::categorical("phenotype", samples, labels).unwrap();
    (features, target)
}

fn quiet(kind: PredictorKind) -> PredictorOptions {
    PredictorOptions::new()
        .with_predictor(kind)
        .with_params(PredictorParams::new().with_n_estimators(50).with_verbose(false))
}

fn bench_fit_and_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_and_score");
    group.sample_size(10);

    for n_features in [50, 200, 1000].iter() {
        let (features, target) = create_expression_data(100, *n_features);

        group.bench_with_input(
            BenchmarkId::new("extra_trees", n_features),
            &(features, target),
            |b, (features, target)| {
                b.iter(|| {
                    let mut predictor = FeaturePredictor::classifier(
                        black_box(features),
                        black_box(target),
                        quiet(PredictorKind::ExtraTrees),
                    )
                    .unwrap();
                    predictor.fit().unwrap();
                    predictor.score().unwrap().n_good_features
                })
            },
        );
    }

    group.finish();
}

fn bench_predictor_kinds(c: &mut Criterion) {
    let mut group = c.benchmark_group("predictor_kinds");
    group.sample_size(10);

    let (features, target) = create_expression_data(100, 200);
    for kind in [
        PredictorKind::ExtraTrees,
        PredictorKind::RandomForest,
        PredictorKind::GradientBoosting,
    ] {
        group.bench_function(format!("{:?}", kind), |b| {
            b.iter(|| {
                let mut predictor =
                    FeaturePredictor::classifier(&features, &target, quiet(kind)).unwrap();
                predictor.fit().unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit_and_score, bench_predictor_kinds);
criterion_main!(benches);
