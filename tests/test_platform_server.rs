//! Integration test: Platform API endpoints

use axum::body::Body;
use axum::http::{Request, StatusCode};
use ml_platform::config::PlatformConfig;
use ml_platform::server::{create_router, AppState, ServerConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    _dir: tempfile::TempDir,
    state: Arc<AppState>,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_upload_size: 10 * 1024 * 1024,
        };
        let state = Arc::new(AppState::new(config, PlatformConfig::rooted_at(dir.path())).unwrap());
        Self { _dir: dir, state }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(Arc::clone(&self.state)).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Model with an uploaded `[x1, x2, y]` dataset, trained for regression
    async fn trained_model(&self) -> i64 {
        let (status, model) = self.post("/api/models", json!({"name": "houses"})).await;
        assert_eq!(status, StatusCode::CREATED);
        let model_id = model["id"].as_i64().unwrap();

        let mut csv = String::from("x1,x2,y\n");
        for i in 0..40 {
            let x1 = i as f64 * 0.5;
            let x2 = ((i * 7) % 11) as f64;
            csv.push_str(&format!("{},{},{}\n", x1, x2, 3.0 * x1 - 2.0 * x2 + 1.0));
        }
        self.state.store_dataset(model_id, "houses.csv", csv.as_bytes()).unwrap();

        let (status, summary) = self
            .post(
                "/api/training/train",
                json!({
                    "model_id": model_id,
                    "task": "regression",
                    "input_columns": ["x1", "x2"],
                    "output_columns": ["y"],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{summary}");
        assert_eq!(summary["all_results"].as_array().unwrap().len(), 2);
        model_id
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_list_models_empty() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/models").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_unknown_ids() {
    let app = TestApp::new();
    let (status, _) = app.get("/api/models/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/api/apis/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = app
        .post("/api/consume/predict", json!({"api_id": 99, "data": {"x1": 1.0}}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_train_without_dataset() {
    let app = TestApp::new();
    let (_, model) = app.post("/api/models", json!({"name": "empty"})).await;
    let (status, _) = app
        .post(
            "/api/training/train",
            json!({
                "model_id": model["id"],
                "task": "regression",
                "input_columns": ["x1"],
                "output_columns": ["y"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/training/train",
            json!({
                "model_id": model["id"],
                "task": "clustering",
                "input_columns": ["x1"],
                "output_columns": ["y"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_train_publish_and_consume() {
    let app = TestApp::new();
    let model_id = app.trained_model().await;

    let (status, endpoint) = app
        .post("/api/apis", json!({"model_id": model_id, "api_name": "prices"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let api_id = endpoint["id"].as_i64().unwrap();
    assert_eq!(endpoint["input_columns"], json!(["x1", "x2"]));

    let (status, _) = app
        .post("/api/apis", json!({"model_id": model_id, "api_name": "prices"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .post("/api/consume/predict", json!({"api_id": api_id, "data": {"x1": 1.0, "x2": 2.0}}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["api_id"], api_id);
    assert!(body["prediction"].as_f64().unwrap().abs() < 1e-6);

    let (status, body) = app
        .post(
            "/api/consume/predict-batch",
            json!({"api_id": api_id, "data": [{"x1": 1.0, "x2": 2.0}, {"x1": 4.0, "x2": 8.0}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predictions"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .post("/api/consume/predict", json!({"api_id": api_id, "data": {"x1": 1.0}}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required columns: x2");

    let (_, endpoint) = app.get(&format!("/api/apis/{}", api_id)).await;
    assert_eq!(endpoint["usage"]["total_requests"], 2);
    assert_eq!(endpoint["usage"]["successful_requests"], 2);

    let (_, logs) = app.get(&format!("/api/apis/{}/logs?limit=1", api_id)).await;
    assert_eq!(logs["logs"].as_array().unwrap().len(), 1);

    let (_, stats) = app.get("/api/stats/dashboard").await;
    assert_eq!(stats["total_models"], 1);
    assert_eq!(stats["total_apis"], 1);
    assert_eq!(stats["total_predictions"], 2);
}

#[tokio::test]
async fn test_external_usage_report() {
    let app = TestApp::new();
    let model_id = app.trained_model().await;
    let (_, endpoint) = app
        .post("/api/apis", json!({"model_id": model_id, "api_name": "reported"}))
        .await;
    let api_id = endpoint["id"].as_i64().unwrap();

    let (status, body) = app
        .post(
            &format!("/api/apis/{}/usage", api_id),
            json!({"success": true, "response_time_ms": 12.0, "cpu_time_ms": 12.0, "memory_used_mb": 0.1}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "logged");
    assert_eq!(body["metrics"]["average_response_time"], 12.0);

    let (status, body) = app
        .post(
            &format!("/api/apis/{}/usage", api_id),
            json!({"success": true, "response_time_ms": -5.0, "cpu_time_ms": 1.0}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("response_time_ms"));

    let (_, endpoint) = app.get(&format!("/api/apis/{}", api_id)).await;
    assert_eq!(endpoint["usage"]["total_requests"], 1);
    assert_eq!(endpoint["usage"]["average_response_time"], 12.0);
}

#[tokio::test]
async fn test_direct_prediction() {
    let app = TestApp::new();
    let model_id = app.trained_model().await;

    let (status, body) = app
        .post(
            "/api/predict",
            json!({"model_id": model_id, "algorithm": "linear_regression", "input_data": [{"x1": 1.0, "x2": 2.0}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predictions"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .post(
            "/api/predict",
            json!({"model_id": model_id, "algorithm": "quantum_forest", "input_data": [{"x1": 1.0}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}
