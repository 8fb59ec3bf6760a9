//! Metadata store for models, generated endpoints and their usage
//!
//! [`MetadataStore`] keeps all records in memory behind a single
//! `parking_lot::RwLock`. When opened with a path, every mutation is written
//! to a JSON snapshot (temp file + rename) before the write lock is released,
//! which makes each update a single-writer transaction.

pub mod usage;

pub use usage::{approximate_memory_mb, UsageEvent, UsageLogEntry, UsageMetrics};

use crate::error::{PlatformError, Result};
use crate::training::{Algorithm, TaskKind, TrainingSummary};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub type ModelId = i64;
pub type EndpointId = i64;

/// Version string given to every generated endpoint
pub const ENDPOINT_VERSION: &str = "1.0.0";

/// A user-defined model and the outcome of its latest training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: ModelId,
    pub name: String,
    pub description: Option<String>,
    pub task: Option<TaskKind>,
    pub input_columns: Vec<String>,
    pub output_columns: Vec<String>,
    pub best_model_path: Option<String>,
    pub best_algorithm: Option<Algorithm>,
    /// Algorithm tag to locator, for every candidate of the latest run
    #[serde(default)]
    pub candidate_paths: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub trained_at: Option<DateTime<Utc>>,
}

impl ModelRecord {
    /// Locator of `algorithm`'s candidate from the latest run
    pub fn candidate_path(&self, algorithm: Algorithm) -> Option<&str> {
        self.candidate_paths.get(algorithm.tag()).map(String::as_str)
    }
}

/// A generated prediction endpoint. Everything except `usage` is frozen at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedEndpoint {
    pub id: EndpointId,
    pub model_id: ModelId,
    pub api_name: String,
    pub description: Option<String>,
    pub best_algorithm: String,
    pub task: TaskKind,
    /// Empty when the endpoint predates contract persistence
    pub input_columns: Vec<String>,
    pub output_column: String,
    /// None when the endpoint predates locator persistence
    pub model_path: Option<String>,
    pub file_path: Option<String>,
    pub version: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub usage: UsageMetrics,
}

/// Fields supplied when registering an endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEndpoint {
    pub model_id: ModelId,
    pub api_name: String,
    pub description: Option<String>,
    pub best_algorithm: String,
    pub task: TaskKind,
    pub input_columns: Vec<String>,
    pub output_column: String,
    pub model_path: Option<String>,
    pub file_path: Option<String>,
}

/// Direct prediction against a stored candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPredictionLog {
    pub model_id: ModelId,
    pub algorithm: String,
    pub timestamp: DateTime<Utc>,
    pub rows: usize,
    pub response_time_ms: Option<f64>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Platform-wide counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_models: usize,
    pub total_apis: usize,
    pub total_predictions: u64,
    pub avg_response_time_ms: f64,
}

/// Persistence of model and endpoint metadata
pub trait MetadataRepository: Send + Sync {
    fn create_model(&self, name: &str, description: Option<&str>) -> Result<ModelRecord>;

    fn get_model(&self, id: ModelId) -> Result<ModelRecord>;

    fn list_models(&self) -> Result<Vec<ModelRecord>>;

    /// Store the contract and winner of a finished training run
    fn record_training(&self, id: ModelId, summary: &TrainingSummary) -> Result<ModelRecord>;

    /// Fails with `NameCollision` when `api_name` is taken
    fn insert_endpoint(&self, endpoint: NewEndpoint) -> Result<GeneratedEndpoint>;

    fn get_endpoint(&self, id: EndpointId) -> Result<GeneratedEndpoint>;

    fn find_endpoint_by_name(&self, api_name: &str) -> Result<Option<GeneratedEndpoint>>;

    fn list_endpoints(&self, skip: usize, limit: usize) -> Result<Vec<GeneratedEndpoint>>;

    /// Fold a call into the endpoint's metrics and usage log atomically
    fn record_usage(&self, id: EndpointId, event: UsageEvent) -> Result<UsageMetrics>;

    /// Most recent usage log entries, newest first
    fn usage_logs(&self, id: EndpointId, limit: usize) -> Result<Vec<UsageLogEntry>>;

    fn log_model_prediction(&self, entry: ModelPredictionLog) -> Result<()>;

    fn dashboard_stats(&self) -> Result<DashboardStats>;

    /// Usage reported by a caller outside the gateway
    fn log_usage(&self, id: EndpointId, event: UsageEvent) -> Result<UsageMetrics> {
        info!(endpoint_id = id, success = event.success, "External usage reported");
        self.record_usage(id, event)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    next_model_id: ModelId,
    next_endpoint_id: EndpointId,
    models: BTreeMap<ModelId, ModelRecord>,
    endpoints: BTreeMap<EndpointId, GeneratedEndpoint>,
    usage_logs: BTreeMap<EndpointId, VecDeque<UsageLogEntry>>,
    prediction_logs: VecDeque<ModelPredictionLog>,
    /// All-time counters so dashboard figures survive log truncation
    predictions_served: u64,
    latency_sum_ms: f64,
    latency_count: u64,
}

impl StoreState {
    fn count_latency(&mut self, latency: Option<f64>) {
        self.predictions_served += 1;
        if let Some(ms) = latency {
            self.latency_sum_ms += ms;
            self.latency_count += 1;
        }
    }
}

/// In-memory metadata store with optional JSON durability
pub struct MetadataStore {
    state: RwLock<StoreState>,
    path: Option<PathBuf>,
    log_capacity: usize,
}

impl MetadataStore {
    /// Memory-only store
    pub fn in_memory(log_capacity: usize) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            path: None,
            log_capacity: log_capacity.max(1),
        }
    }

    /// Load the snapshot at `path` if present; later mutations are written back to it
    pub fn open(path: impl Into<PathBuf>, log_capacity: usize) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            StoreState::default()
        };
        info!(path = %path.display(), "Metadata store opened");
        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
            log_capacity: log_capacity.max(1),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = path.with_extension("json.tmp");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&tmp, bytes)
            .and_then(|_| fs::rename(&tmp, path))
            .map_err(|e| PlatformError::Storage(format!("failed to persist metadata: {}", e)))?;
        debug!(path = %path.display(), "Metadata snapshot written");
        Ok(())
    }
}

fn model_not_found(id: ModelId) -> PlatformError {
    PlatformError::NotFound(format!("model {}", id))
}

fn endpoint_not_found(id: EndpointId) -> PlatformError {
    PlatformError::NotFound(format!("API {}", id))
}

impl MetadataRepository for MetadataStore {
    fn create_model(&self, name: &str, description: Option<&str>) -> Result<ModelRecord> {
        let mut state = self.state.write();
        state.next_model_id += 1;
        let record = ModelRecord {
            id: state.next_model_id,
            name: name.to_string(),
            description: description.map(str::to_string),
            task: None,
            input_columns: Vec::new(),
            output_columns: Vec::new(),
            best_model_path: None,
            best_algorithm: None,
            candidate_paths: BTreeMap::new(),
            created_at: Utc::now(),
            trained_at: None,
        };
        state.models.insert(record.id, record.clone());
        if let Err(e) = self.persist(&state) {
            state.models.remove(&record.id);
            state.next_model_id -= 1;
            return Err(e);
        }
        Ok(record)
    }

    fn get_model(&self, id: ModelId) -> Result<ModelRecord> {
        self.state
            .read()
            .models
            .get(&id)
            .cloned()
            .ok_or_else(|| model_not_found(id))
    }

    fn list_models(&self) -> Result<Vec<ModelRecord>> {
        Ok(self.state.read().models.values().cloned().collect())
    }

    fn record_training(&self, id: ModelId, summary: &TrainingSummary) -> Result<ModelRecord> {
        let mut state = self.state.write();
        let record = state.models.get_mut(&id).ok_or_else(|| model_not_found(id))?;
        let previous = record.clone();

        record.task = Some(summary.task);
        record.input_columns = summary.input_columns.clone();
        record.output_columns = summary.output_columns.clone();
        record.best_model_path = Some(summary.best_model_path.clone());
        record.best_algorithm = Some(summary.best_algorithm);
        record.candidate_paths = summary
            .all_results
            .iter()
            .map(|c| (c.algorithm.tag().to_string(), c.model_path.clone()))
            .collect();
        record.trained_at = Some(Utc::now());
        let updated = record.clone();

        if let Err(e) = self.persist(&state) {
            state.models.insert(id, previous);
            return Err(e);
        }
        Ok(updated)
    }

    fn insert_endpoint(&self, endpoint: NewEndpoint) -> Result<GeneratedEndpoint> {
        let mut state = self.state.write();
        if state.endpoints.values().any(|e| e.api_name == endpoint.api_name) {
            return Err(PlatformError::NameCollision(endpoint.api_name));
        }
        state.next_endpoint_id += 1;
        let record = GeneratedEndpoint {
            id: state.next_endpoint_id,
            model_id: endpoint.model_id,
            api_name: endpoint.api_name,
            description: endpoint.description,
            best_algorithm: endpoint.best_algorithm,
            task: endpoint.task,
            input_columns: endpoint.input_columns,
            output_column: endpoint.output_column,
            model_path: endpoint.model_path,
            file_path: endpoint.file_path,
            version: ENDPOINT_VERSION.to_string(),
            created_at: Utc::now(),
            usage: UsageMetrics::default(),
        };
        state.endpoints.insert(record.id, record.clone());
        if let Err(e) = self.persist(&state) {
            state.endpoints.remove(&record.id);
            state.next_endpoint_id -= 1;
            return Err(e);
        }
        info!(endpoint_id = record.id, api_name = %record.api_name, "Endpoint registered");
        Ok(record)
    }

    fn get_endpoint(&self, id: EndpointId) -> Result<GeneratedEndpoint> {
        self.state
            .read()
            .endpoints
            .get(&id)
            .cloned()
            .ok_or_else(|| endpoint_not_found(id))
    }

    fn find_endpoint_by_name(&self, api_name: &str) -> Result<Option<GeneratedEndpoint>> {
        Ok(self
            .state
            .read()
            .endpoints
            .values()
            .find(|e| e.api_name == api_name)
            .cloned())
    }

    fn list_endpoints(&self, skip: usize, limit: usize) -> Result<Vec<GeneratedEndpoint>> {
        Ok(self
            .state
            .read()
            .endpoints
            .values()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    fn record_usage(&self, id: EndpointId, event: UsageEvent) -> Result<UsageMetrics> {
        let mut state = self.state.write();
        let endpoint = state.endpoints.get_mut(&id).ok_or_else(|| endpoint_not_found(id))?;
        let previous = endpoint.usage.clone();
        endpoint.usage.record_event(&event);
        let updated = endpoint.usage.clone();

        let (served, latency_sum, latency_count) =
            (state.predictions_served, state.latency_sum_ms, state.latency_count);
        state.count_latency(event.response_time_ms);

        let capacity = self.log_capacity;
        let log = state.usage_logs.entry(id).or_default();
        log.push_back(UsageLogEntry::from_event(&event));
        let evicted = if log.len() > capacity { log.pop_front() } else { None };

        if let Err(e) = self.persist(&state) {
            // Roll back so memory matches the last durable snapshot
            if let Some(endpoint) = state.endpoints.get_mut(&id) {
                endpoint.usage = previous;
            }
            if let Some(log) = state.usage_logs.get_mut(&id) {
                log.pop_back();
                if let Some(entry) = evicted {
                    log.push_front(entry);
                }
            }
            state.predictions_served = served;
            state.latency_sum_ms = latency_sum;
            state.latency_count = latency_count;
            return Err(e);
        }
        Ok(updated)
    }

    fn usage_logs(&self, id: EndpointId, limit: usize) -> Result<Vec<UsageLogEntry>> {
        let state = self.state.read();
        if !state.endpoints.contains_key(&id) {
            return Err(endpoint_not_found(id));
        }
        Ok(state
            .usage_logs
            .get(&id)
            .map(|log| log.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn log_model_prediction(&self, entry: ModelPredictionLog) -> Result<()> {
        let mut state = self.state.write();
        state.count_latency(entry.response_time_ms);
        state.prediction_logs.push_back(entry);
        if state.prediction_logs.len() > self.log_capacity {
            state.prediction_logs.pop_front();
        }
        self.persist(&state)
    }

    fn dashboard_stats(&self) -> Result<DashboardStats> {
        let state = self.state.read();
        let avg = if state.latency_count > 0 {
            state.latency_sum_ms / state.latency_count as f64
        } else {
            0.0
        };
        Ok(DashboardStats {
            total_models: state.models.len(),
            total_apis: state.endpoints.len(),
            total_predictions: state.predictions_served,
            avg_response_time_ms: avg,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_endpoint(model_id: ModelId, name: &str) -> NewEndpoint {
        NewEndpoint {
            model_id,
            api_name: name.to_string(),
            description: None,
            best_algorithm: "linear_regression".to_string(),
            task: TaskKind::Regression,
            input_columns: vec!["x1".into(), "x2".into()],
            output_column: "y".into(),
            model_path: Some("model_1_linear_regression.bin".into()),
            file_path: None,
        }
    }

    #[test]
    fn test_model_ids_increment() {
        let store = MetadataStore::in_memory(10);
        let a = store.create_model("a", None).unwrap();
        let b = store.create_model("b", Some("second")).unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(store.list_models().unwrap().len(), 2);
        assert!(matches!(store.get_model(3), Err(PlatformError::NotFound(_))));
    }

    #[test]
    fn test_endpoint_name_is_unique() {
        let store = MetadataStore::in_memory(10);
        let endpoint = store.insert_endpoint(new_endpoint(1, "House Prices")).unwrap();
        assert_eq!(endpoint.version, "1.0.0");
        assert_eq!(endpoint.usage, UsageMetrics::default());

        let err = store.insert_endpoint(new_endpoint(2, "House Prices")).unwrap_err();
        assert!(matches!(err, PlatformError::NameCollision(_)));
        assert!(store.find_endpoint_by_name("House Prices").unwrap().is_some());
    }

    #[test]
    fn test_list_endpoints_paging() {
        let store = MetadataStore::in_memory(10);
        for i in 0..5 {
            store.insert_endpoint(new_endpoint(1, &format!("api {}", i))).unwrap();
        }
        let page = store.list_endpoints(1, 2).unwrap();
        assert_eq!(page.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_usage_logs_are_bounded() {
        let store = MetadataStore::in_memory(3);
        let endpoint = store.insert_endpoint(new_endpoint(1, "api")).unwrap();
        for i in 0..5 {
            store.record_usage(endpoint.id, UsageEvent::success(i as f64, 1)).unwrap();
        }
        let logs = store.usage_logs(endpoint.id, 10).unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].response_time_ms, Some(4.0));

        let stats = store.dashboard_stats().unwrap();
        assert_eq!(stats.total_predictions, 5);
        assert!((stats.avg_response_time_ms - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_concurrent_usage_updates_keep_average() {
        let store = Arc::new(MetadataStore::in_memory(1000));
        let endpoint = store.insert_endpoint(new_endpoint(1, "api")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let latency = (t * 50 + i) as f64;
                        store.record_usage(endpoint.id, UsageEvent::success(latency, 1)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let usage = store.get_endpoint(endpoint.id).unwrap().usage;
        assert_eq!(usage.total_requests, 400);
        assert_eq!(usage.successful_requests, 400);
        // mean of 0..400
        assert!((usage.average_response_time - 199.5).abs() < 1e-6);
    }

    #[test]
    fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        {
            let store = MetadataStore::open(&path, 10).unwrap();
            let model = store.create_model("m", None).unwrap();
            let endpoint = store.insert_endpoint(new_endpoint(model.id, "api")).unwrap();
            store.record_usage(endpoint.id, UsageEvent::success(8.0, 1)).unwrap();
        }

        let store = MetadataStore::open(&path, 10).unwrap();
        let endpoint = store.get_endpoint(1).unwrap();
        assert_eq!(endpoint.usage.total_requests, 1);
        assert_eq!(endpoint.usage.average_response_time, 8.0);
        assert_eq!(store.create_model("n", None).unwrap().id, 2);
    }

    #[test]
    fn test_record_usage_unknown_endpoint() {
        let store = MetadataStore::in_memory(10);
        assert!(matches!(
            store.record_usage(42, UsageEvent::failure("boom")),
            Err(PlatformError::NotFound(_))
        ));
    }
}
