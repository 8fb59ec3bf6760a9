//! Serving gateway and usage ledger
//!
//! Resolves a generated endpoint's frozen model and contract, validates the
//! payload against it, runs inference and folds the call into the
//! endpoint's usage metrics.

use crate::error::{PlatformError, Result};
use crate::registry::{
    EndpointId, GeneratedEndpoint, MetadataRepository, ModelId, ModelPredictionLog, UsageEvent, UsageMetrics,
};
use crate::storage::{latest_model_file, load_model, ArtifactStore};
use crate::training::{Algorithm, ModelArtifact};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::cache::ModelCache;
use super::payload::{PredictionOutput, PredictionPayload};

/// Result of one served call
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutcome {
    pub endpoint_id: EndpointId,
    pub output: PredictionOutput,
    pub elapsed_ms: f64,
    pub rows: usize,
    /// None when the metrics update failed and was skipped
    pub usage: Option<UsageMetrics>,
}

impl PredictionOutcome {
    pub fn is_single(&self) -> bool {
        matches!(self.output, PredictionOutput::Single(_))
    }

    /// `{api_id, prediction | predictions, response_time_ms}`
    pub fn to_response(&self) -> Value {
        let mut body = Map::new();
        body.insert("api_id".to_string(), json!(self.endpoint_id));
        self.output.clone().write_into(&mut body);
        body.insert("response_time_ms".to_string(), json!(self.elapsed_ms));
        Value::Object(body)
    }
}

/// Result of a direct prediction against a stored candidate
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePrediction {
    pub model_id: ModelId,
    pub algorithm: Algorithm,
    pub predictions: Vec<Value>,
    pub elapsed_ms: f64,
}

pub struct ServingGateway {
    repository: Arc<dyn MetadataRepository>,
    store: Arc<dyn ArtifactStore>,
    cache: ModelCache,
}

impl ServingGateway {
    pub fn new(repository: Arc<dyn MetadataRepository>, store: Arc<dyn ArtifactStore>, cache: ModelCache) -> Self {
        Self {
            repository,
            store,
            cache,
        }
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Forget the cached model of a redefined endpoint
    pub fn evict(&self, endpoint_id: EndpointId) {
        self.cache.evict(endpoint_id);
    }

    /// Serve `body` (`{"data": <record> | [<record>, ...]}`) against an endpoint.
    ///
    /// Validation short-circuits in order: endpoint, model file, contract,
    /// payload shape, columns. Validation failures leave the metrics alone;
    /// failures after validation count as failed requests.
    pub fn serve_prediction(&self, endpoint_id: EndpointId, body: &Value) -> Result<PredictionOutcome> {
        let start = Instant::now();

        let endpoint = self.repository.get_endpoint(endpoint_id)?;
        let locator = self.resolve_locator(&endpoint)?;
        if endpoint.input_columns.is_empty() {
            return Err(PlatformError::ContractMissing(format!(
                "endpoint {} has no input column metadata",
                endpoint_id
            )));
        }
        let payload = PredictionPayload::from_body(body)?;
        let rows = payload.project(&endpoint.input_columns)?;

        let predictions = self
            .model_for(endpoint_id, &locator)
            .and_then(|model| model.predict_rows(&rows));
        let predictions = match predictions {
            Ok(p) => p,
            Err(e) => {
                warn!(endpoint_id, error = %e, "Prediction failed");
                self.record(endpoint_id, UsageEvent::failure(e.to_string()));
                return Err(e);
            }
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let n_rows = payload.len();
        let usage = self.record(endpoint_id, UsageEvent::success(elapsed_ms, n_rows));
        debug!(endpoint_id, rows = n_rows, elapsed_ms, "Prediction served");

        Ok(PredictionOutcome {
            endpoint_id,
            output: payload.shape(predictions),
            elapsed_ms,
            rows: n_rows,
            usage,
        })
    }

    /// Predict with any persisted candidate of a model, not only the winner
    pub fn predict_candidate(&self, model_id: ModelId, algorithm: Algorithm, data: &Value) -> Result<CandidatePrediction> {
        let record = self.repository.get_model(model_id)?;
        let locator = record
            .candidate_path(algorithm)
            .filter(|path| self.store.exists(path))
            .map(str::to_string)
            .ok_or_else(|| {
                PlatformError::ModelFileMissing(format!("no {} candidate for model {}", algorithm.tag(), model_id))
            })?;

        let start = Instant::now();
        let result = PredictionPayload::from_data(data).and_then(|payload| {
            let model = load_model(self.store.as_ref(), &locator)?;
            let rows = payload.project(&model.input_names())?;
            Ok((payload.len(), model.predict_rows(&rows)?))
        });
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let entry = match &result {
            Ok((rows, _)) => ModelPredictionLog {
                model_id,
                algorithm: algorithm.tag().to_string(),
                timestamp: chrono::Utc::now(),
                rows: *rows,
                response_time_ms: Some(elapsed_ms),
                success: true,
                error_message: None,
            },
            Err(e) => ModelPredictionLog {
                model_id,
                algorithm: algorithm.tag().to_string(),
                timestamp: chrono::Utc::now(),
                rows: 0,
                response_time_ms: None,
                success: false,
                error_message: Some(e.to_string()),
            },
        };
        if let Err(e) = self.repository.log_model_prediction(entry) {
            warn!(model_id, error = %e, "Failed to log model prediction");
        }

        let (_, predictions) = result?;
        Ok(CandidatePrediction {
            model_id,
            algorithm,
            predictions,
            elapsed_ms,
        })
    }

    /// Frozen locator if it still resolves, else the newest candidate file of the owning model
    fn resolve_locator(&self, endpoint: &GeneratedEndpoint) -> Result<String> {
        if let Some(path) = endpoint.model_path.as_deref() {
            if self.store.exists(path) {
                return Ok(path.to_string());
            }
        }
        match latest_model_file(self.store.as_ref(), endpoint.model_id)? {
            Some(found) => {
                warn!(
                    endpoint_id = endpoint.id,
                    model_id = endpoint.model_id,
                    locator = %found.locator,
                    "Endpoint has no usable model locator, using most recent model file"
                );
                Ok(found.locator)
            }
            None => Err(PlatformError::ModelFileMissing(format!(
                "no trained model file for endpoint {}",
                endpoint.id
            ))),
        }
    }

    fn model_for(&self, endpoint_id: EndpointId, locator: &str) -> Result<Arc<ModelArtifact>> {
        if let Some(model) = self.cache.get(endpoint_id, locator) {
            return Ok(model);
        }
        let model = Arc::new(load_model(self.store.as_ref(), locator)?);
        self.cache.insert(endpoint_id, locator, Arc::clone(&model));
        info!(endpoint_id, locator = %locator, "Model loaded");
        Ok(model)
    }

    /// Metrics failures never fail the call
    fn record(&self, endpoint_id: EndpointId, event: UsageEvent) -> Option<UsageMetrics> {
        match self.repository.record_usage(endpoint_id, event) {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!(endpoint_id, error = %e, "Failed to update usage metrics");
                None
            }
        }
    }
}
