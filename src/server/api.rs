//! API route definitions

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, state::AppState};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found. Visit /api/health to check API status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": "Method not allowed",
        })),
    )
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_upload_size = state.config.max_upload_size;

    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        // Models
        .route("/models", get(handlers::list_models).post(handlers::create_model))
        .route("/models/:model_id", get(handlers::get_model))
        .route("/models/:model_id/dataset", post(handlers::upload_dataset))
        // Training
        .route("/training/analyze", post(handlers::analyze_dataset))
        .route("/training/train", post(handlers::train_model))
        // Generated endpoints
        .route("/apis", get(handlers::list_apis).post(handlers::create_api))
        .route("/apis/:api_id", get(handlers::get_api))
        .route("/apis/:api_id/usage", post(handlers::log_api_usage))
        .route("/apis/:api_id/logs", get(handlers::get_api_logs))
        // Serving
        .route("/consume/predict", post(handlers::consume_predict))
        .route("/consume/predict-batch", post(handlers::consume_predict_batch))
        .route("/predict", post(handlers::predict_direct))
        // Stats
        .route("/stats/dashboard", get(handlers::get_dashboard_stats))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405);

    // CORS configured via CORS_ORIGIN env var (default: allow all)
    let cors = match std::env::var("CORS_ORIGIN") {
        Ok(origin) if !origin.is_empty() && origin != "*" => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<axum::http::HeaderValue>()
                    .unwrap_or_else(|_| axum::http::HeaderValue::from_static("*")),
            )
            .allow_methods(Any)
            .allow_headers(Any),
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    Router::new()
        .nest("/api", api_routes)
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
