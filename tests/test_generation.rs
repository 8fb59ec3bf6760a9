//! Integration test: Endpoint generation

mod common;

use common::{cols, Platform};
use ml_platform::generator::{artifact_identifier, publish_endpoint, GenerationRequest, ServiceManifest};
use ml_platform::registry::MetadataRepository;
use ml_platform::storage::ArtifactStore;
use ml_platform::training::TaskKind;
use ml_platform::PlatformError;
use std::path::Path;

#[test]
fn test_publish_freezes_contract() {
    let platform = Platform::new();
    let (record, summary) = platform.trained_regression_model("houses");

    let endpoint =
        publish_endpoint(&*platform.repository, &platform.generator, record.id, "House Prices", Some("demo")).unwrap();

    assert_eq!(endpoint.model_id, record.id);
    assert_eq!(endpoint.best_algorithm, summary.best_algorithm.tag());
    assert_eq!(endpoint.input_columns, cols(&["x1", "x2"]));
    assert_eq!(endpoint.output_column, "y");
    assert_eq!(endpoint.model_path.as_deref(), Some(summary.best_model_path.as_str()));
    assert_eq!(endpoint.version, "1.0.0");
    assert_eq!(endpoint.usage.total_requests, 0);

    let manifest_path = endpoint.file_path.clone().unwrap();
    assert!(manifest_path.ends_with(&format!("{}.json", artifact_identifier(record.id, "House Prices"))));

    let manifest = ServiceManifest::load(Path::new(&manifest_path)).unwrap();
    assert_eq!(manifest.api_name, "House Prices");
    assert_eq!(manifest.model_id, record.id);
    assert_eq!(manifest.model_path, summary.best_model_path);
    assert_eq!(manifest.task, TaskKind::Regression);
    assert_eq!(manifest.input_columns, cols(&["x1", "x2"]));
    assert_eq!(manifest.output_column, "y");
    assert!(platform.models.exists(&manifest.model_path));
}

#[test]
fn test_identifier_is_stable() {
    let platform = Platform::new();
    let request = GenerationRequest {
        model_id: 7,
        endpoint_name: "Churn Model".to_string(),
        algorithm: "random_forest".to_string(),
        model_path: "model_7_random_forest.bin".to_string(),
        input_columns: cols(&["tenure", "plan"]),
        output_columns: cols(&["churned"]),
        task: TaskKind::Classification,
    };

    let first = platform.generator.generate(&request).unwrap();
    let second = platform.generator.generate(&request).unwrap();
    assert_eq!(first.identifier, "api_7_churn_model");
    assert_eq!(first.identifier, second.identifier);
    assert_eq!(platform.generated.list_matching("api_7_*.json").unwrap().len(), 1);
}

#[test]
fn test_same_name_different_models_do_not_collide_on_disk() {
    assert_ne!(artifact_identifier(1, "Demo"), artifact_identifier(2, "demo"));
}

#[test]
fn test_name_collision() {
    let platform = Platform::new();
    let endpoint = platform.regression_endpoint("prices");

    let err = publish_endpoint(&*platform.repository, &platform.generator, endpoint.model_id, "prices", None)
        .unwrap_err();
    assert!(matches!(err, PlatformError::NameCollision(ref name) if name == "prices"));
    assert_eq!(platform.repository.list_endpoints(0, 10).unwrap().len(), 1);
}

#[test]
fn test_names_sharing_an_identifier_collide() {
    let platform = Platform::new();
    let (record, _) = platform.trained_regression_model("houses");
    let first =
        publish_endpoint(&*platform.repository, &platform.generator, record.id, "House Prices", None).unwrap();
    assert_eq!(artifact_identifier(record.id, "house.prices"), artifact_identifier(record.id, "House Prices"));

    let err = publish_endpoint(&*platform.repository, &platform.generator, record.id, "house.prices", None)
        .unwrap_err();
    assert!(matches!(err, PlatformError::NameCollision(ref name) if name == "house.prices"));

    let endpoints = platform.repository.list_endpoints(0, 10).unwrap();
    assert_eq!(endpoints.len(), 1);
    let manifest = ServiceManifest::load(Path::new(first.file_path.as_deref().unwrap())).unwrap();
    assert_eq!(manifest.api_name, "House Prices");
}

#[test]
fn test_untrained_model_cannot_be_published() {
    let platform = Platform::new();
    let record = platform.repository.create_model("blank", None).unwrap();
    let err = publish_endpoint(&*platform.repository, &platform.generator, record.id, "blank", None).unwrap_err();
    assert!(matches!(err, PlatformError::Schema(_)));

    let err = publish_endpoint(&*platform.repository, &platform.generator, 404, "nothing", None).unwrap_err();
    assert!(matches!(err, PlatformError::NotFound(_)));
}
