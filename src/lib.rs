//! ML Platform - train, select and serve tabular models
//!
//! A dataset is trained against a fixed roster of candidate algorithms, the
//! best candidate is frozen into an endpoint manifest, and predictions served
//! against that endpoint are tracked in a usage ledger.
//!
//! # Modules
//!
//! ## Core
//! - [`training`] - Candidate roster, metrics, selection and model artifacts
//! - [`generator`] - Endpoint manifests for trained models
//! - [`serving`] - Payload validation, prediction service runtime, serving gateway
//!
//! ## Collaborators
//! - [`data`] - Dataset access (CSV, JSON, Parquet)
//! - [`storage`] - Artifact store for models and manifests
//! - [`registry`] - Model, endpoint and usage metadata
//!
//! ## Services
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Core
pub mod training;
pub mod generator;
pub mod serving;

// Collaborators
pub mod data;
pub mod storage;
pub mod registry;

// Services
pub mod server;
pub mod cli;

pub use error::{PlatformError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::PlatformConfig;
    pub use crate::data::{CsvDatasetAccessor, DatasetAccessor, DatasetHandle, InMemoryDatasets};
    pub use crate::error::{PlatformError, Result};
    pub use crate::generator::{publish_endpoint, ArtifactGenerator, GenerationRequest, ServiceManifest};
    pub use crate::registry::{MetadataRepository, MetadataStore, UsageEvent, UsageMetrics};
    pub use crate::serving::{ModelCache, PredictionService, ServingGateway};
    pub use crate::storage::{ArtifactStore, LocalArtifactStore};
    pub use crate::training::{Algorithm, TaskKind, Trainer, TrainingSummary};
}
