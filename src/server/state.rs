//! Application state management

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::PlatformConfig;
use crate::data::{CsvDatasetAccessor, DatasetHandle};
use crate::error::Result;
use crate::generator::ArtifactGenerator;
use crate::registry::{MetadataRepository, MetadataStore};
use crate::serving::{ModelCache, ServingGateway};
use crate::storage::{ArtifactStore, LocalArtifactStore};
use crate::training::Trainer;

use super::ServerConfig;

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    pub platform: PlatformConfig,
    pub repository: Arc<dyn MetadataRepository>,
    pub datasets: Arc<CsvDatasetAccessor>,
    pub models: Arc<dyn ArtifactStore>,
    pub trainer: Trainer,
    pub generator: ArtifactGenerator,
    pub gateway: ServingGateway,
}

impl AppState {
    pub fn new(config: ServerConfig, platform: PlatformConfig) -> Result<Self> {
        platform.ensure_dirs()?;

        let repository: Arc<dyn MetadataRepository> = match &platform.metadata_path {
            Some(path) => Arc::new(MetadataStore::open(path, platform.usage_log_capacity)?),
            None => Arc::new(MetadataStore::in_memory(platform.usage_log_capacity)),
        };
        let datasets = Arc::new(CsvDatasetAccessor::new());
        let models: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(&platform.models_dir)?);
        let generated: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(&platform.generated_dir)?);

        let cache = ModelCache::new(
            platform.model_cache_capacity,
            Duration::from_secs(platform.model_cache_ttl_secs),
        );

        let state = Self {
            trainer: Trainer::new(datasets.clone(), Arc::clone(&models), &platform),
            generator: ArtifactGenerator::new(generated),
            gateway: ServingGateway::new(Arc::clone(&repository), Arc::clone(&models), cache),
            config,
            platform,
            repository,
            datasets,
            models,
        };
        state.restore_datasets()?;
        Ok(state)
    }

    /// File name an upload for `handle` is stored under
    pub fn dataset_file_name(handle: DatasetHandle, original_name: &str) -> String {
        let base = std::path::Path::new(original_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data.csv".to_string());
        format!("model_{}_{}", handle, base)
    }

    /// Store an uploaded dataset and associate it with `handle`
    pub fn store_dataset(&self, handle: DatasetHandle, original_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self
            .platform
            .data_dir
            .join(Self::dataset_file_name(handle, original_name));
        std::fs::write(&path, bytes)?;
        self.datasets.register(handle, &path);
        info!(dataset = handle, path = %path.display(), size = bytes.len(), "Dataset stored");
        Ok(path)
    }

    /// Re-associate uploads left in the data directory by a previous run
    fn restore_datasets(&self) -> Result<()> {
        for model in self.repository.list_models()? {
            let prefix = format!("model_{}_", model.id);
            let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;
            for entry in std::fs::read_dir(&self.platform.data_dir)? {
                let entry = entry?;
                if !entry.file_name().to_string_lossy().starts_with(&prefix) {
                    continue;
                }
                let modified = entry.metadata()?.modified()?;
                if latest.as_ref().map_or(true, |(t, _)| modified > *t) {
                    latest = Some((modified, entry.path()));
                }
            }
            if let Some((_, path)) = latest {
                debug!(dataset = model.id, path = %path.display(), "Dataset restored");
                self.datasets.register(model.id, path);
            }
        }
        Ok(())
    }
}
