//! Integration tests for the model server API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use model_server::{
    api::{create_router, shutdown_signal, AppState},
    config::ServerConfig,
};
use serde_json::{json, Value};
use serving_lib::{catalog, ModelRegistry, ServingMetrics, StructuredLogger};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const FOREST: &str = r#"{
    "n_features": 8,
    "classes": [0, 1],
    "trees": [
        {"nodes": [
            {"feature": 7, "threshold": 10.0, "left": 1, "right": 2},
            {"value": [8.0, 2.0]},
            {"value": [1.0, 3.0]}
        ]}
    ]
}"#;

const KMEANS: &str = r#"{
    "n_clusters": 5,
    "centroids": [[-1.0, -1.0], [1.0, -1.0], [0.0, 0.0], [-1.0, 1.0], [1.0, 1.0]]
}"#;

const SCALER: &str = r#"{"mean": [60.0, 50.0], "scale": [20.0, 20.0]}"#;

const REGRESSION: &str = r#"{"coefficients": [1000.0, 5000.0], "intercept": 10000.0}"#;

fn write_artifacts(dir: &Path, files: &[(&str, &str)]) {
    for (name, contents) in files {
        fs::write(dir.join(name), contents).unwrap();
    }
}

/// Build the router over whatever artifacts exist in `dir`
fn app_for(dir: &TempDir) -> Router {
    let config = ServerConfig {
        model_dir: dir.path().to_string_lossy().into_owned(),
        ..ServerConfig::default()
    };
    let registry = Arc::new(ModelRegistry::load(&config.artifact_store(), catalog::builtin()));
    let metrics = ServingMetrics::new();
    metrics.set_registry(&registry);

    let state = Arc::new(AppState::new(
        registry,
        metrics,
        StructuredLogger::new("test-instance"),
    ));
    create_router(state)
}

fn full_app() -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    write_artifacts(
        dir.path(),
        &[
            ("rf_winequality_best.json", FOREST),
            ("kmeans_mall.json", KMEANS),
            ("scaler_mall.json", SCALER),
            ("regression.json", REGRESSION),
        ],
    );
    (app_for(&dir), dir)
}

fn house_only_app() -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    write_artifacts(dir.path(), &[("regression.json", REGRESSION)]);
    (app_for(&dir), dir)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

async fn post_raw(app: &Router, uri: &str, body: String) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    post_raw(app, uri, body.to_string()).await
}

fn wine_sample() -> Value {
    json!({
        "fixed_acidity": 7.4,
        "volatile_acidity": 0.7,
        "citric_acid": 0.0,
        "chlorides": 0.076,
        "total_sulfur_dioxide": 34.0,
        "density": 0.9978,
        "sulphates": 0.56,
        "alcohol": 9.4
    })
}

#[tokio::test]
async fn test_wine_prediction() {
    let (app, _dir) = full_app();

    let (status, body) = post(&app, "/predict/wine", wine_sample()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"], "wine_quality");
    assert_eq!(body["quality"], "Bad (<6)");
    assert_eq!(body["prediction"], 0);
    let confidence = body["confidence"].as_f64().unwrap();
    assert!((0.5..=1.0).contains(&confidence));
    let total: f64 = body["probability"]
        .as_object()
        .unwrap()
        .values()
        .map(|p| p.as_f64().unwrap())
        .sum();
    assert!((total - 1.0).abs() < 1e-6);
    assert_eq!(body["input_features"]["alcohol"], 9.4);
}

#[tokio::test]
async fn test_customer_prediction() {
    let (app, _dir) = full_app();

    let (status, body) = post(
        &app,
        "/predict/customer",
        json!({"annual_income": 50, "spending_score": 60}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let cluster = body["cluster"].as_u64().unwrap();
    assert!(cluster < 5);
    assert_eq!(body["all_centroids"].as_array().unwrap().len(), 5);
    assert_eq!(body["distances_to_centroids"].as_array().unwrap().len(), 5);
    let confidence = body["confidence"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&confidence));
    assert!(body["cluster_meaning"].is_string());
}

#[tokio::test]
async fn test_customer_missing_feature_returns_400() {
    let (app, _dir) = full_app();

    let (status, body) = post(&app, "/predict/customer", json!({"annual_income": 50})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["missing_features"], json!(["spending_score"]));
    assert_eq!(
        body["required_features"],
        json!(["annual_income", "spending_score"])
    );
    assert!(body["error"].as_str().unwrap().contains("spending_score"));
}

#[tokio::test]
async fn test_house_prediction() {
    let (app, _dir) = full_app();

    let (status, body) = post(&app, "/predict/house", json!({"Area": 120.0, "Room": 3})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"], "house_price");
    assert_eq!(body["prediction"].as_f64().unwrap(), 145000.0);
}

#[tokio::test]
async fn test_non_numeric_value_returns_500() {
    let (app, _dir) = full_app();

    let (status, body) = post(&app, "/predict/house", json!({"Area": "large", "Room": 3})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
    assert!(body.get("missing_features").is_none());
}

#[tokio::test]
async fn test_non_object_body_returns_400() {
    let (app, _dir) = full_app();

    let (status, body) = post(&app, "/predict/house", json!([1, 2])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = post_raw(&app, "/predict/house", "{not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_predictor_returns_404() {
    let (app, _dir) = full_app();

    let (status, body) = post(&app, "/predict/stock", json!({})).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("stock"));
}

#[tokio::test]
async fn test_unloaded_predictor_returns_500() {
    let (app, _dir) = house_only_app();

    let (status, body) = post(&app, "/predict/wine", wine_sample()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("not loaded"));
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let (app, _dir) = full_app();

    let (status, body) = post(
        &app,
        "/predict/batch",
        json!({
            "wine_samples": [wine_sample(), {"alcohol": 12.0}],
            "customer_samples": [{"annual_income": 100, "spending_score": 90}],
            "notes": "ignored"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let wine = body["wine_predictions"].as_array().unwrap();
    assert_eq!(wine.len(), 2);
    assert_eq!(wine[0]["sample_index"], 0);
    assert_eq!(wine[0]["quality"], "Bad (<6)");
    assert_eq!(wine[1]["sample_index"], 1);
    assert!(wine[1]["error"].is_string());
    assert_eq!(wine[1]["missing_features"].as_array().unwrap().len(), 7);

    let customer = body["customer_predictions"].as_array().unwrap();
    assert_eq!(customer[0]["cluster"], 4);
    assert!(body.get("house_predictions").is_none());
}

#[tokio::test]
async fn test_batch_for_unloaded_predictor_reports_per_item_errors() {
    let (app, _dir) = house_only_app();

    let (status, body) = post(
        &app,
        "/predict/batch",
        json!({"wine_samples": [wine_sample(), wine_sample()]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let wine = body["wine_predictions"].as_array().unwrap();
    assert_eq!(wine.len(), 2);
    assert!(wine.iter().all(|item| item["error"].is_string()));
}

#[tokio::test]
async fn test_batch_rejects_non_array_samples() {
    let (app, _dir) = full_app();

    let (status, body) = post(&app, "/predict/batch", json!({"house_samples": 3})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("house_samples"));
}

#[tokio::test]
async fn test_health_all_loaded() {
    let (app, _dir) = full_app();

    let (status, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["wine"], true);
    assert_eq!(body["customer"], true);
    assert_eq!(body["house"], true);
}

#[tokio::test]
async fn test_health_degraded_when_partially_loaded() {
    let (app, _dir) = house_only_app();

    let (status, body) = get(&app, "/health").await;

    // Still operational
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["house"], true);
    assert_eq!(body["wine"], false);
}

#[tokio::test]
async fn test_health_unavailable_when_nothing_loaded() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&dir);

    let (status, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_models_info() {
    let (app, _dir) = house_only_app();

    let (status, body) = get(&app, "/models/info").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["wine"].is_null());
    assert!(body["customer"].is_null());
    assert_eq!(body["house"]["model_type"], "LinearRegression");
    assert_eq!(body["house"]["n_coefficients"], 2);
    assert_eq!(body["house"]["features"], json!(["Area", "Room"]));
}

#[tokio::test]
async fn test_index_lists_features_and_examples() {
    let (app, _dir) = full_app();

    let (status, body) = get(&app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["features"]["customer"], json!(["annual_income", "spending_score"]));
    assert!(body["examples"]["POST /predict/wine"].is_object());
    assert!(body["endpoints"]["/predict/batch"].is_string());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _dir) = full_app();
    post(&app, "/predict/house", json!({"Area": 10, "Room": 1})).await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("model_server_predictions_total"));
    assert!(text.contains("model_server_prediction_latency_seconds"));
    assert!(text.contains("model_server_model_loaded"));
}

#[tokio::test]
async fn test_unknown_names_stay_out_of_metrics() {
    let (app, _dir) = full_app();

    post(&app, "/predict/unlisted_alpha", json!({})).await;
    post(&app, "/predict/unlisted_beta", json!({})).await;
    post(
        &app,
        "/predict/batch",
        json!({"unlisted_gamma_samples": [{}], "unlisted_delta_samples": [{}]}),
    )
    .await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(!text.contains("unlisted_"));
    assert!(text.contains(r#"predictor="unknown""#));
}

#[tokio::test]
async fn test_shutdown_signal_resolves_on_signal() {
    let shutdown = shutdown_signal(async { Ok(()) }, StructuredLogger::new("test-instance"));

    let finished = tokio::time::timeout(Duration::from_secs(1), shutdown).await;
    assert!(finished.is_ok());
}

#[tokio::test]
async fn test_shutdown_signal_failure_keeps_server_running() {
    let failed = async { Err(std::io::Error::new(std::io::ErrorKind::Other, "no signal driver")) };
    let shutdown = shutdown_signal(failed, StructuredLogger::new("test-instance"));

    let finished = tokio::time::timeout(Duration::from_millis(50), shutdown).await;
    assert!(finished.is_err(), "shutdown must not fire when the listener fails");
}
