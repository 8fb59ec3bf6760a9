//! Integration test: Training pipeline end-to-end

use ml_platform::config::PlatformConfig;
use ml_platform::data::InMemoryDatasets;
use ml_platform::storage::{load_model, ArtifactStore, LocalArtifactStore};
use ml_platform::training::{train_test_split, Algorithm, TaskKind, Trainer, TrainingSummary};
use ml_platform::PlatformError;
use polars::prelude::*;
use std::sync::Arc;

fn regression_df() -> DataFrame {
    let x1: Vec<f64> = (0..40).map(|i| i as f64 * 0.5).collect();
    let x2: Vec<f64> = (0..40).map(|i| ((i * 7) % 11) as f64).collect();
    let y: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| 3.0 * a - 2.0 * b + 1.0).collect();
    df!("x1" => x1, "x2" => x2, "y" => y).unwrap()
}

fn classification_df() -> DataFrame {
    let f1: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { i as f64 * 0.1 } else { 10.0 + i as f64 * 0.1 }).collect();
    let f2: Vec<f64> = (0..40).map(|i| ((i * 3) % 5) as f64).collect();
    let label: Vec<&str> = (0..40).map(|i| if i % 2 == 0 { "low" } else { "high" }).collect();
    df!("f1" => f1, "f2" => f2, "label" => label).unwrap()
}

fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

struct Fixture {
    _dir: tempfile::TempDir,
    datasets: Arc<InMemoryDatasets>,
    store: Arc<LocalArtifactStore>,
    trainer: Trainer,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = PlatformConfig::rooted_at(dir.path());
    let datasets = Arc::new(InMemoryDatasets::new());
    let store = Arc::new(LocalArtifactStore::new(&config.models_dir).unwrap());
    let trainer = Trainer::new(datasets.clone(), store.clone(), &config);
    Fixture {
        _dir: dir,
        datasets,
        store,
        trainer,
    }
}

fn assert_winner_is_extremal(summary: &TrainingSummary) {
    let winner = summary.winner().expect("winner must be one of the candidates");
    match summary.task {
        TaskKind::Classification => {
            let best = winner.metrics.accuracy().unwrap();
            for c in &summary.all_results {
                assert!(c.metrics.accuracy().unwrap() <= best);
            }
            assert_eq!(summary.justification, "Selected based on highest accuracy");
        }
        TaskKind::Regression => {
            let best = winner.metrics.mse().unwrap();
            for c in &summary.all_results {
                assert!(c.metrics.mse().unwrap() >= best);
            }
            assert_eq!(summary.justification, "Selected based on lowest MSE");
        }
    }
    assert_eq!(summary.best_model_path, winner.model_path);
}

#[test]
fn test_regression_roster_and_winner() {
    let f = fixture();
    f.datasets.insert(1, regression_df());

    let summary = f
        .trainer
        .train(1, TaskKind::Regression, &cols(&["x1", "x2"]), &cols(&["y"]))
        .unwrap();

    let algorithms: Vec<Algorithm> = summary.all_results.iter().map(|c| c.algorithm).collect();
    assert_eq!(algorithms, vec![Algorithm::RandomForestRegressor, Algorithm::LinearRegression]);
    assert_eq!(summary.all_results[0].algorithm.tag(), "random_forest_reg");
    assert_eq!(summary.all_results[1].algorithm.tag(), "linear_regression");
    for c in &summary.all_results {
        let json = serde_json::to_value(&c.metrics).unwrap();
        assert!(json.get("MSE").is_some());
        assert!(json.get("MAE").is_some());
        assert!(json.get("R2").is_some());
    }
    assert_winner_is_extremal(&summary);
    // exact linear target
    assert_eq!(summary.best_algorithm, Algorithm::LinearRegression);
}

#[test]
fn test_classification_with_text_labels() {
    let f = fixture();
    f.datasets.insert(2, classification_df());

    let summary = f
        .trainer
        .train(2, TaskKind::Classification, &cols(&["f1", "f2"]), &cols(&["label"]))
        .unwrap();

    let algorithms: Vec<Algorithm> = summary.all_results.iter().map(|c| c.algorithm).collect();
    assert_eq!(algorithms, vec![Algorithm::RandomForest, Algorithm::LogisticRegression]);
    assert_winner_is_extremal(&summary);

    let json = serde_json::to_value(&summary.all_results[0].metrics).unwrap();
    for key in ["accuracy", "f1_score", "precision", "recall", "confusion_matrix"] {
        assert!(json.get(key).is_some(), "missing metric {key}");
    }
}

#[test]
fn test_every_candidate_is_persisted() {
    let f = fixture();
    f.datasets.insert(3, regression_df());

    let summary = f
        .trainer
        .train(3, TaskKind::Regression, &cols(&["x1", "x2"]), &cols(&["y"]))
        .unwrap();

    for c in &summary.all_results {
        assert!(f.store.exists(&c.model_path));
        let model = load_model(&*f.store, &c.model_path).unwrap();
        assert_eq!(model.algorithm, c.algorithm);
        assert_eq!(model.input_names(), cols(&["x1", "x2"]));
    }
    assert_eq!(f.store.list_matching("model_3_*.bin").unwrap().len(), 2);
}

#[test]
fn test_same_seed_same_result() {
    let f = fixture();
    f.datasets.insert(4, regression_df());
    let inputs = cols(&["x1", "x2"]);
    let outputs = cols(&["y"]);

    let first = f.trainer.train(4, TaskKind::Regression, &inputs, &outputs).unwrap();
    let second = f.trainer.train(4, TaskKind::Regression, &inputs, &outputs).unwrap();
    let metrics = |s: &TrainingSummary| s.all_results.iter().map(|c| c.metrics.clone()).collect::<Vec<_>>();
    assert_eq!(metrics(&first), metrics(&second));

    let a = train_test_split(40, 0.2, 42).unwrap();
    let b = train_test_split(40, 0.2, 42).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_unknown_handle() {
    let f = fixture();
    let err = f
        .trainer
        .train(99, TaskKind::Regression, &cols(&["x1"]), &cols(&["y"]))
        .unwrap_err();
    assert!(matches!(err, PlatformError::DataUnavailable(99)));
}

#[test]
fn test_missing_column_is_schema_error() {
    let f = fixture();
    f.datasets.insert(5, regression_df());
    let err = f
        .trainer
        .train(5, TaskKind::Regression, &cols(&["x1", "x9"]), &cols(&["y"]))
        .unwrap_err();
    assert!(matches!(err, PlatformError::Schema(ref msg) if msg.contains("x9")));
}

#[test]
fn test_empty_dataset() {
    let f = fixture();
    f.datasets.insert(6, df!("x1" => Vec::<f64>::new(), "y" => Vec::<f64>::new()).unwrap());
    let err = f
        .trainer
        .train(6, TaskKind::Regression, &cols(&["x1"]), &cols(&["y"]))
        .unwrap_err();
    assert!(matches!(err, PlatformError::EmptyDataset { .. }));
}

#[test]
fn test_output_listed_as_input() {
    let f = fixture();
    f.datasets.insert(7, regression_df());
    let err = f
        .trainer
        .train(7, TaskKind::Regression, &cols(&["x1", "y"]), &cols(&["y"]))
        .unwrap_err();
    assert!(matches!(err, PlatformError::Schema(_)));
}

#[test]
fn test_analyze() {
    let f = fixture();
    f.datasets.insert(8, regression_df());
    let summary = f.trainer.analyze(8).unwrap();
    assert_eq!(summary.n_rows, 40);
    assert_eq!(summary.n_columns, 3);
    assert_eq!(summary.columns, cols(&["x1", "x2", "y"]));
}
