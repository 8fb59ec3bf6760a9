//! Platform configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fraction of rows held out for scoring candidates
pub const DEFAULT_TEST_SIZE: f64 = 0.2;

/// Seed used for the train/test split and the forest bootstraps
pub const DEFAULT_RANDOM_STATE: u64 = 42;

/// Storage locations and training/serving knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Directory holding persisted candidate models
    pub models_dir: PathBuf,
    /// Directory holding generated endpoint manifests
    pub generated_dir: PathBuf,
    /// Directory holding uploaded datasets
    pub data_dir: PathBuf,
    /// JSON snapshot of the metadata store (None = memory only)
    pub metadata_path: Option<PathBuf>,
    /// Held-out fraction for the train/test split
    pub test_size: f64,
    /// Seed for the split and for randomized algorithms
    pub random_state: u64,
    /// Maximum number of loaded models kept per process (0 = load on every call)
    pub model_cache_capacity: usize,
    /// Time-to-live for cached models
    pub model_cache_ttl_secs: u64,
    /// Usage log entries retained per endpoint
    pub usage_log_capacity: usize,
}

pub(crate) fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            models_dir: std::env::var("MODELS_DIR")
                .unwrap_or_else(|_| "./models".to_string())
                .into(),
            generated_dir: std::env::var("GENERATED_DIR")
                .unwrap_or_else(|_| "./generated_apis".to_string())
                .into(),
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./uploaded_files".to_string())
                .into(),
            metadata_path: Some(
                std::env::var("METADATA_PATH")
                    .unwrap_or_else(|_| "./ml_platform.json".to_string())
                    .into(),
            ),
            test_size: DEFAULT_TEST_SIZE,
            random_state: DEFAULT_RANDOM_STATE,
            model_cache_capacity: env_or("MODEL_CACHE_CAPACITY", 32),
            model_cache_ttl_secs: env_or("MODEL_CACHE_TTL_SECS", 3600),
            usage_log_capacity: env_or("USAGE_LOG_CAPACITY", 1000),
        }
    }
}

impl PlatformConfig {
    /// Configuration rooted at a single directory, memory-only metadata.
    /// Used by tests and embedded setups.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            models_dir: root.join("models"),
            generated_dir: root.join("generated_apis"),
            data_dir: root.join("uploaded_files"),
            metadata_path: None,
            ..Default::default()
        }
    }

    /// Builder method to set the metadata snapshot path
    pub fn with_metadata_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata_path = Some(path.into());
        self
    }

    /// Builder method to set the random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Builder method to set the model cache capacity
    pub fn with_model_cache_capacity(mut self, capacity: usize) -> Self {
        self.model_cache_capacity = capacity;
        self
    }

    /// Create every configured directory
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.models_dir)?;
        std::fs::create_dir_all(&self.generated_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}
