use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ml_platform::config::PlatformConfig;
use ml_platform::data::InMemoryDatasets;
use ml_platform::generator::{publish_endpoint, ArtifactGenerator};
use ml_platform::registry::{MetadataRepository, MetadataStore};
use ml_platform::serving::{ModelCache, ServingGateway};
use ml_platform::storage::{ArtifactStore, LocalArtifactStore};
use ml_platform::training::{TaskKind, Trainer};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

const N_FEATURES: usize = 10;

fn feature_names() -> Vec<String> {
    (0..N_FEATURES).map(|i| format!("feature_{}", i)).collect()
}

fn create_regression_data(n_rows: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    let features: Vec<Vec<f64>> = (0..N_FEATURES)
        .map(|_| (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect())
        .collect();

    // Target is the feature sum plus noise
    let target: Vec<f64> = (0..n_rows)
        .map(|i| features.iter().map(|f| f[i]).sum::<f64>() + rng.gen::<f64>() * 0.1)
        .collect();

    let mut columns: Vec<Column> = features
        .into_iter()
        .zip(feature_names())
        .map(|(values, name)| Series::new(name.into(), values).into())
        .collect();
    columns.push(Series::new("target".into(), target).into());

    DataFrame::new(columns).unwrap()
}

fn request_rows(n_rows: usize) -> Value {
    let rows: Vec<Value> = (0..n_rows)
        .map(|i| {
            let record: Map<String, Value> = feature_names()
                .into_iter()
                .enumerate()
                .map(|(j, name)| (name, json!((i * j) as f64 * 0.1)))
                .collect();
            Value::Object(record)
        })
        .collect();
    json!({ "data": rows })
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10);

    let dir = tempfile::tempdir().unwrap();
    let config = PlatformConfig::rooted_at(dir.path());
    config.ensure_dirs().unwrap();
    let datasets = Arc::new(InMemoryDatasets::new());
    let store = Arc::new(LocalArtifactStore::new(&config.models_dir).unwrap());
    let trainer = Trainer::new(datasets.clone(), store, &config);
    let inputs = feature_names();
    let outputs = vec!["target".to_string()];

    for n_rows in [1000usize, 5000] {
        let handle = n_rows as i64;
        datasets.insert(handle, create_regression_data(n_rows));

        group.bench_with_input(BenchmarkId::new("train", n_rows), &handle, |b, &handle| {
            b.iter(|| {
                trainer
                    .train(black_box(handle), TaskKind::Regression, &inputs, &outputs)
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_serving(c: &mut Criterion) {
    let mut group = c.benchmark_group("serving");

    let dir = tempfile::tempdir().unwrap();
    let config = PlatformConfig::rooted_at(dir.path());
    config.ensure_dirs().unwrap();
    let datasets = Arc::new(InMemoryDatasets::new());
    let models: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(&config.models_dir).unwrap());
    let generated: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(&config.generated_dir).unwrap());
    let repository = Arc::new(MetadataStore::in_memory(config.usage_log_capacity));

    let record = repository.create_model("bench", None).unwrap();
    datasets.insert(record.id, create_regression_data(2000));
    let trainer = Trainer::new(datasets, Arc::clone(&models), &config);
    let summary = trainer
        .train(record.id, TaskKind::Regression, &feature_names(), &["target".to_string()])
        .unwrap();
    repository.record_training(record.id, &summary).unwrap();

    let generator = ArtifactGenerator::new(generated);
    let endpoint = publish_endpoint(&*repository, &generator, record.id, "bench", None).unwrap();

    for (label, cache) in [
        ("cached", ModelCache::new(4, Duration::from_secs(3600))),
        ("uncached", ModelCache::disabled()),
    ] {
        let gateway = ServingGateway::new(repository.clone(), Arc::clone(&models), cache);
        for n_rows in [1usize, 100] {
            let body = request_rows(n_rows);
            group.bench_with_input(BenchmarkId::new(label, n_rows), &body, |b, body| {
                b.iter(|| gateway.serve_prediction(endpoint.id, black_box(body)).unwrap())
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_training, bench_serving);
criterion_main!(benches);
