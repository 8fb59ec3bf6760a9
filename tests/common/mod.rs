//! Shared fixtures for integration tests

#![allow(dead_code)]

use ml_platform::config::PlatformConfig;
use ml_platform::data::InMemoryDatasets;
use ml_platform::generator::{publish_endpoint, ArtifactGenerator};
use ml_platform::registry::{GeneratedEndpoint, MetadataRepository, MetadataStore, ModelRecord};
use ml_platform::storage::{ArtifactStore, LocalArtifactStore};
use ml_platform::training::{TaskKind, Trainer, TrainingSummary};
use polars::prelude::*;
use std::sync::Arc;

/// Columns `[x1, x2, y]` with `y = 3*x1 - 2*x2 + 1`
pub fn regression_df() -> DataFrame {
    let x1: Vec<f64> = (0..40).map(|i| i as f64 * 0.5).collect();
    let x2: Vec<f64> = (0..40).map(|i| ((i * 7) % 11) as f64).collect();
    let y: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| 3.0 * a - 2.0 * b + 1.0).collect();
    df!("x1" => x1, "x2" => x2, "y" => y).unwrap()
}

pub fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Temp-rooted platform with an in-memory metadata store
pub struct Platform {
    pub dir: tempfile::TempDir,
    pub config: PlatformConfig,
    pub repository: Arc<MetadataStore>,
    pub datasets: Arc<InMemoryDatasets>,
    pub models: Arc<LocalArtifactStore>,
    pub generated: Arc<LocalArtifactStore>,
    pub trainer: Trainer,
    pub generator: ArtifactGenerator,
}

impl Platform {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = PlatformConfig::rooted_at(dir.path());
        config.ensure_dirs().unwrap();
        let repository = Arc::new(MetadataStore::in_memory(100));
        let datasets = Arc::new(InMemoryDatasets::new());
        let models = Arc::new(LocalArtifactStore::new(&config.models_dir).unwrap());
        let generated = Arc::new(LocalArtifactStore::new(&config.generated_dir).unwrap());
        let trainer = Trainer::new(datasets.clone(), models.clone(), &config);
        let generator = ArtifactGenerator::new(generated.clone());
        Self {
            dir,
            config,
            repository,
            datasets,
            models,
            generated,
            trainer,
            generator,
        }
    }

    pub fn models_store(&self) -> Arc<dyn ArtifactStore> {
        self.models.clone()
    }

    pub fn repo(&self) -> Arc<dyn MetadataRepository> {
        self.repository.clone()
    }

    /// Register and train the `[x1, x2] -> y` regression model
    pub fn trained_regression_model(&self, name: &str) -> (ModelRecord, TrainingSummary) {
        let record = self.repository.create_model(name, None).unwrap();
        self.datasets.insert(record.id, regression_df());
        let summary = self
            .trainer
            .train(record.id, TaskKind::Regression, &cols(&["x1", "x2"]), &cols(&["y"]))
            .unwrap();
        let record = self.repository.record_training(record.id, &summary).unwrap();
        (record, summary)
    }

    /// Trained model plus a published endpoint for it
    pub fn regression_endpoint(&self, api_name: &str) -> GeneratedEndpoint {
        let (record, _) = self.trained_regression_model("houses");
        publish_endpoint(&*self.repository, &self.generator, record.id, api_name, None).unwrap()
    }
}
