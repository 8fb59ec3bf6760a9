//! Runtime of a generated prediction service
//!
//! A [`PredictionService`] is built once from a [`ServiceManifest`]. It loads
//! the frozen model and then stays either `Ready` or `Degraded` for the rest
//! of its life; a new manifest means a new process.

use crate::error::{PlatformError, Result};
use crate::generator::ServiceManifest;
use crate::server::{shutdown_signal, ServerError};
use crate::storage::{load_model, ArtifactStore, LocalArtifactStore};
use crate::training::ModelArtifact;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::payload::PredictionPayload;

/// Lifecycle of a prediction service
#[derive(Clone)]
pub enum ServiceState {
    Loading,
    Ready(Arc<ModelArtifact>),
    Degraded(String),
}

impl ServiceState {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceState::Loading => "loading",
            ServiceState::Ready(_) => "ready",
            ServiceState::Degraded(_) => "degraded",
        }
    }
}

pub struct PredictionService {
    manifest: ServiceManifest,
    state: ServiceState,
}

impl PredictionService {
    /// Load the manifest's model. Load failures put the service in `Degraded`
    /// instead of failing startup.
    pub fn start(manifest: ServiceManifest, store: &dyn ArtifactStore) -> Self {
        let mut service = Self {
            manifest,
            state: ServiceState::Loading,
        };
        service.state = match service.load(store) {
            Ok(model) => {
                info!(
                    api_name = %service.manifest.api_name,
                    model_id = service.manifest.model_id,
                    algorithm = %service.manifest.algorithm,
                    "Model loaded, service ready"
                );
                ServiceState::Ready(Arc::new(model))
            }
            Err(e) => {
                error!(
                    api_name = %service.manifest.api_name,
                    model_path = %service.manifest.model_path,
                    error = %e,
                    "Model failed to load, service degraded"
                );
                ServiceState::Degraded(e.to_string())
            }
        };
        service
    }

    /// Start from a manifest file, resolving relative model paths against the
    /// manifest's directory
    pub fn from_manifest_file(path: &Path) -> Result<Self> {
        let manifest = ServiceManifest::load(path)?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        let store = LocalArtifactStore::new(root)?;
        Ok(Self::start(manifest, &store))
    }

    fn load(&self, store: &dyn ArtifactStore) -> Result<ModelArtifact> {
        let model = load_model(store, &self.manifest.model_path)?;
        let frozen = &self.manifest.input_columns;
        if &model.input_names() != frozen {
            return Err(PlatformError::Schema(format!(
                "model inputs {:?} do not match contract {:?}",
                model.input_names(),
                frozen
            )));
        }
        Ok(model)
    }

    pub fn manifest(&self) -> &ServiceManifest {
        &self.manifest
    }

    pub fn state(&self) -> &ServiceState {
        &self.state
    }

    fn model(&self) -> Result<&Arc<ModelArtifact>> {
        match &self.state {
            ServiceState::Ready(model) => Ok(model),
            ServiceState::Degraded(reason) => Err(PlatformError::ModelUnavailable(reason.clone())),
            ServiceState::Loading => Err(PlatformError::ModelUnavailable("model is still loading".to_string())),
        }
    }

    pub fn health(&self) -> Result<Value> {
        self.model()?;
        Ok(json!({
            "status": "ok",
            "api_name": self.manifest.api_name,
            "model_id": self.manifest.model_id,
            "algorithm": self.manifest.algorithm,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
    }

    pub fn info(&self) -> Result<Value> {
        self.model()?;
        Ok(json!({
            "api_name": self.manifest.api_name,
            "model_id": self.manifest.model_id,
            "algorithm": self.manifest.algorithm,
            "task": self.manifest.task,
            "input_columns": self.manifest.input_columns,
            "output_column": self.manifest.output_column,
            "created_at": self.manifest.created_at,
        }))
    }

    /// Validate, project and predict a `{"data": ...}` body
    pub fn predict(&self, body: &Value) -> Result<Value> {
        let model = self.model()?;
        let start = Instant::now();

        let payload = PredictionPayload::from_body(body)?;
        let rows = payload.project(&self.manifest.input_columns)?;
        let predictions = model.predict_rows(&rows)?;
        let response_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        let mut response = Map::new();
        payload.shape(predictions).write_into(&mut response);
        response.insert("response_time_ms".to_string(), json!(response_time_ms));
        response.insert("task".to_string(), json!(self.manifest.task));
        response.insert("model_id".to_string(), json!(self.manifest.model_id));
        Ok(Value::Object(response))
    }
}

/// Parse a JSON body without axum's plain-text rejection
pub(crate) fn parse_json_body(body: &Bytes) -> Result<Value> {
    serde_json::from_slice(body)
        .map_err(|e| PlatformError::MalformedPayload(format!("Invalid JSON body: {}", e)))
}

async fn health(State(service): State<Arc<PredictionService>>) -> std::result::Result<Json<Value>, ServerError> {
    Ok(Json(service.health()?))
}

async fn info(State(service): State<Arc<PredictionService>>) -> std::result::Result<Json<Value>, ServerError> {
    Ok(Json(service.info()?))
}

async fn predict(
    State(service): State<Arc<PredictionService>>,
    body: Bytes,
) -> std::result::Result<Json<Value>, ServerError> {
    let body = parse_json_body(&body)?;
    Ok(Json(service.predict(&body)?))
}

async fn endpoint_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Endpoint not found" })))
}

/// Router exposing `GET /health`, `GET /info` and `POST /predict`
pub fn endpoint_router(service: Arc<PredictionService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .route("/predict", post(predict))
        .fallback(endpoint_not_found)
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

/// Host the service described by `manifest_path` until ctrl+c
pub async fn run_endpoint_server(manifest_path: &Path, host: &str, port: Option<u16>) -> anyhow::Result<()> {
    let service = Arc::new(PredictionService::from_manifest_file(manifest_path)?);
    let port = port.unwrap_or(service.manifest().default_port);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!(
        api_name = %service.manifest().api_name,
        state = service.state().name(),
        address = %addr,
        "Prediction service starting"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, endpoint_router(service))
        .with_graceful_shutdown(shutdown_signal("prediction-service"))
        .await?;

    info!("Prediction service shut down cleanly");
    Ok(())
}
