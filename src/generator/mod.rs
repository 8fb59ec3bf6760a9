//! Endpoint artifact generation
//!
//! A generated endpoint is a [`ServiceManifest`]: a JSON record that freezes
//! the model locator and the input/output contract. Any `ml-platform
//! serve-endpoint --manifest <file>` process can host it without access to
//! the metadata store.

use crate::error::{PlatformError, Result};
use crate::registry::{GeneratedEndpoint, MetadataRepository, ModelId, NewEndpoint};
use crate::storage::ArtifactStore;
use crate::training::TaskKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Version of the runtime contract a manifest targets
pub const CONTRACT_VERSION: u32 = 1;

/// Port a generated service listens on unless told otherwise
pub const DEFAULT_ENDPOINT_PORT: u16 = 5000;

/// Output name used when the model declares no output column
pub const DEFAULT_OUTPUT_COLUMN: &str = "prediction";

/// Lower-case the name and replace anything outside `[a-z0-9_-]` with `_`
pub fn sanitize_endpoint_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Filesystem-safe identifier unique per (model, name)
pub fn artifact_identifier(model_id: ModelId, endpoint_name: &str) -> String {
    format!("api_{}_{}", model_id, sanitize_endpoint_name(endpoint_name))
}

/// Configuration record of a generated prediction service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceManifest {
    pub contract_version: u32,
    pub identifier: String,
    pub api_name: String,
    pub model_id: ModelId,
    pub model_path: String,
    pub algorithm: String,
    pub task: TaskKind,
    pub input_columns: Vec<String>,
    pub output_column: String,
    pub default_port: u16,
    pub created_at: DateTime<Utc>,
}

impl ServiceManifest {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let manifest: Self = serde_json::from_slice(bytes)?;
        if manifest.contract_version != CONTRACT_VERSION {
            return Err(PlatformError::Config(format!(
                "unsupported manifest contract version {} (expected {})",
                manifest.contract_version, CONTRACT_VERSION
            )));
        }
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read(path)?)
    }
}

/// Inputs of one generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model_id: ModelId,
    pub endpoint_name: String,
    pub algorithm: String,
    pub model_path: String,
    pub input_columns: Vec<String>,
    pub output_columns: Vec<String>,
    pub task: TaskKind,
}

/// A written manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointArtifact {
    pub identifier: String,
    pub manifest_path: String,
    pub manifest: ServiceManifest,
}

/// Writes manifests into an artifact store
pub struct ArtifactGenerator {
    store: Arc<dyn ArtifactStore>,
}

impl ArtifactGenerator {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Emit the manifest for `request`. Identical requests yield the same
    /// identifier and overwrite the same file; name uniqueness is enforced
    /// by the metadata store.
    pub fn generate(&self, request: &GenerationRequest) -> Result<EndpointArtifact> {
        if sanitize_endpoint_name(&request.endpoint_name).is_empty() {
            return Err(PlatformError::Schema("endpoint name must not be empty".to_string()));
        }
        if request.input_columns.is_empty() {
            return Err(PlatformError::Schema(
                "cannot generate an endpoint without input columns".to_string(),
            ));
        }

        let identifier = artifact_identifier(request.model_id, &request.endpoint_name);
        let manifest = ServiceManifest {
            contract_version: CONTRACT_VERSION,
            identifier: identifier.clone(),
            api_name: request.endpoint_name.clone(),
            model_id: request.model_id,
            model_path: request.model_path.clone(),
            algorithm: request.algorithm.clone(),
            task: request.task,
            input_columns: request.input_columns.clone(),
            output_column: request
                .output_columns
                .first()
                .cloned()
                .unwrap_or_else(|| DEFAULT_OUTPUT_COLUMN.to_string()),
            default_port: DEFAULT_ENDPOINT_PORT,
            created_at: Utc::now(),
        };

        let bytes = serde_json::to_vec_pretty(&manifest)?;
        let manifest_path = self.store.write(&format!("{}.json", identifier), &bytes)?;
        info!(identifier = %identifier, path = %manifest_path, "Endpoint manifest generated");

        Ok(EndpointArtifact {
            identifier,
            manifest_path,
            manifest,
        })
    }
}

/// Generate and register an endpoint for the latest training run of `model_id`
pub fn publish_endpoint(
    repository: &dyn MetadataRepository,
    generator: &ArtifactGenerator,
    model_id: ModelId,
    endpoint_name: &str,
    description: Option<&str>,
) -> Result<GeneratedEndpoint> {
    if repository.find_endpoint_by_name(endpoint_name)?.is_some() {
        return Err(PlatformError::NameCollision(endpoint_name.to_string()));
    }
    // Distinct names can sanitize to the same manifest file
    let identifier = artifact_identifier(model_id, endpoint_name);
    let shares_artifact = repository
        .list_endpoints(0, usize::MAX)?
        .iter()
        .any(|existing| artifact_identifier(existing.model_id, &existing.api_name) == identifier);
    if shares_artifact {
        return Err(PlatformError::NameCollision(endpoint_name.to_string()));
    }
    let model = repository.get_model(model_id)?;
    let (task, algorithm, model_path) = match (model.task, model.best_algorithm, model.best_model_path) {
        (Some(task), Some(algorithm), Some(path)) => (task, algorithm, path),
        _ => {
            return Err(PlatformError::Schema(format!(
                "model {} has not been trained yet",
                model_id
            )))
        }
    };

    let artifact = generator.generate(&GenerationRequest {
        model_id,
        endpoint_name: endpoint_name.to_string(),
        algorithm: algorithm.tag().to_string(),
        model_path,
        input_columns: model.input_columns.clone(),
        output_columns: model.output_columns.clone(),
        task,
    })?;

    repository.insert_endpoint(NewEndpoint {
        model_id,
        api_name: endpoint_name.to_string(),
        description: description.map(str::to_string),
        best_algorithm: artifact.manifest.algorithm.clone(),
        task,
        input_columns: artifact.manifest.input_columns.clone(),
        output_column: artifact.manifest.output_column.clone(),
        model_path: Some(artifact.manifest.model_path.clone()),
        file_path: Some(artifact.manifest_path.clone()),
    })
}
