//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::data::parse_table;
use crate::generator::publish_endpoint;
use crate::registry::{EndpointId, ModelId, UsageEvent};
use crate::serving::server::parse_json_body;
use crate::training::{Algorithm, TaskKind};

use super::error::{Result, ServerError};
use super::state::AppState;

// ============================================================================
// Health
// ============================================================================

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ============================================================================
// Model Handlers
// ============================================================================

#[derive(Deserialize)]
pub struct CreateModelRequest {
    name: String,
    description: Option<String>,
}

pub async fn create_model(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateModelRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    if request.name.trim().is_empty() {
        return Err(ServerError::BadRequest("Model name must not be empty".to_string()));
    }
    let record = state
        .repository
        .create_model(&request.name, request.description.as_deref())?;
    Ok((StatusCode::CREATED, Json(json!(record))))
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let models = state.repository.list_models()?;
    Ok(Json(json!({
        "total": models.len(),
        "models": models,
    })))
}

pub async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(model_id): Path<ModelId>,
) -> Result<Json<Value>> {
    let record = state.repository.get_model(model_id)?;
    let dataset = state.datasets.path_of(model_id).map(|p| p.display().to_string());
    Ok(Json(json!({
        "model": record,
        "dataset": dataset,
    })))
}

/// Upload the dataset a model is trained on
pub async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    Path(model_id): Path<ModelId>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    state.repository.get_model(model_id)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        let file_name = field.file_name().unwrap_or("data.csv").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;

        info!(model_id, file = %file_name, size = data.len(), "Received dataset");

        // Parse before storing so unreadable uploads are rejected up front
        let df = parse_table(&file_name, &data)?;
        let path = state.store_dataset(model_id, &file_name, &data)?;
        let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();

        return Ok(Json(json!({
            "status": "uploaded",
            "path": path.display().to_string(),
            "rows": df.height(),
            "columns": columns,
        })));
    }

    Err(ServerError::BadRequest("No file uploaded".to_string()))
}

// ============================================================================
// Training Handlers
// ============================================================================

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    model_id: ModelId,
}

pub async fn analyze_dataset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Value>> {
    state.repository.get_model(request.model_id)?;
    let summary = state.trainer.analyze(request.model_id)?;
    Ok(Json(json!(summary)))
}

#[derive(Deserialize)]
pub struct TrainRequest {
    model_id: ModelId,
    task: String,
    input_columns: Vec<String>,
    output_columns: Vec<String>,
}

pub async fn train_model(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrainRequest>,
) -> Result<Json<Value>> {
    let task: TaskKind = request
        .task
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("Invalid task: {}", request.task)))?;
    state.repository.get_model(request.model_id)?;

    // Candidate fits take seconds to minutes
    let state_clone = Arc::clone(&state);
    let summary = tokio::task::spawn_blocking(move || {
        let summary = state_clone.trainer.train(
            request.model_id,
            task,
            &request.input_columns,
            &request.output_columns,
        )?;
        state_clone.repository.record_training(request.model_id, &summary)?;
        Ok::<_, crate::error::PlatformError>(summary)
    })
    .await
    .map_err(|e| ServerError::Internal(format!("training task panicked: {}", e)))??;

    Ok(Json(json!(summary)))
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

#[derive(Deserialize)]
pub struct CreateApiRequest {
    model_id: ModelId,
    api_name: String,
    description: Option<String>,
}

pub async fn create_api(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateApiRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let endpoint = publish_endpoint(
        state.repository.as_ref(),
        &state.generator,
        request.model_id,
        &request.api_name,
        request.description.as_deref(),
    )?;
    state.gateway.evict(endpoint.id);
    info!(endpoint_id = endpoint.id, api_name = %endpoint.api_name, "Endpoint created");
    Ok((StatusCode::CREATED, Json(json!(endpoint))))
}

#[derive(Deserialize)]
pub struct ListQuery {
    skip: Option<usize>,
    limit: Option<usize>,
}

pub async fn list_apis(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>> {
    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(100).min(1000);
    let apis = state.repository.list_endpoints(skip, limit)?;
    let total = state.repository.dashboard_stats()?.total_apis;
    Ok(Json(json!({
        "apis": apis,
        "total": total,
    })))
}

pub async fn get_api(
    State(state): State<Arc<AppState>>,
    Path(api_id): Path<EndpointId>,
) -> Result<Json<Value>> {
    let endpoint = state.repository.get_endpoint(api_id)?;
    Ok(Json(json!(endpoint)))
}

/// Usage reported by a caller that served the endpoint itself
pub async fn log_api_usage(
    State(state): State<Arc<AppState>>,
    Path(api_id): Path<EndpointId>,
    Json(event): Json<UsageEvent>,
) -> Result<Json<Value>> {
    if let Some(field) = event.invalid_measurement() {
        return Err(ServerError::BadRequest(format!(
            "{} must be a finite, non-negative number",
            field
        )));
    }
    let metrics = state.repository.log_usage(api_id, event)?;
    Ok(Json(json!({
        "status": "logged",
        "metrics": metrics,
    })))
}

#[derive(Deserialize)]
pub struct LogsQuery {
    limit: Option<usize>,
}

pub async fn get_api_logs(
    State(state): State<Arc<AppState>>,
    Path(api_id): Path<EndpointId>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Value>> {
    let logs = state
        .repository
        .usage_logs(api_id, query.limit.unwrap_or(100))?;
    Ok(Json(json!({
        "api_id": api_id,
        "logs": logs,
    })))
}

pub async fn get_dashboard_stats(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    Ok(Json(json!(state.repository.dashboard_stats()?)))
}

// ============================================================================
// Prediction Handlers
// ============================================================================

fn api_id_of(body: &Value) -> Result<EndpointId> {
    body.get("api_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| ServerError::BadRequest("Expected integer field 'api_id'".to_string()))
}

/// `{api_id, data: {...}}` → `{api_id, prediction, response_time_ms}`
pub async fn consume_predict(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>> {
    let body = parse_json_body(&body)?;
    let api_id = api_id_of(&body)?;
    serve(state, api_id, body).await
}

/// `{api_id, data: [{...}, ...]}` → `{api_id, predictions, response_time_ms}`
pub async fn consume_predict_batch(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>> {
    let body = parse_json_body(&body)?;
    let api_id = api_id_of(&body)?;
    // A lone record is served as a batch of one
    let body = match body.get("data") {
        Some(Value::Object(record)) => json!({ "api_id": api_id, "data": [record] }),
        _ => body,
    };
    serve(state, api_id, body).await
}

async fn serve(state: Arc<AppState>, api_id: EndpointId, body: Value) -> Result<Json<Value>> {
    let outcome = tokio::task::spawn_blocking(move || state.gateway.serve_prediction(api_id, &body))
        .await
        .map_err(|e| ServerError::Internal(format!("prediction task panicked: {}", e)))??;
    Ok(Json(outcome.to_response()))
}

#[derive(Deserialize)]
pub struct DirectPredictRequest {
    model_id: ModelId,
    algorithm: String,
    input_data: Value,
}

/// Predict with any stored candidate of a model
pub async fn predict_direct(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DirectPredictRequest>,
) -> Result<Json<Value>> {
    let algorithm: Algorithm = request
        .algorithm
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("Unknown algorithm: {}", request.algorithm)))?;

    let prediction = tokio::task::spawn_blocking(move || {
        state
            .gateway
            .predict_candidate(request.model_id, algorithm, &request.input_data)
    })
    .await
    .map_err(|e| ServerError::Internal(format!("prediction task panicked: {}", e)))??;

    Ok(Json(json!({
        "predictions": prediction.predictions,
        "response_time_ms": prediction.elapsed_ms,
    })))
}
