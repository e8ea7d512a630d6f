//! HTTP API: prediction endpoints, health, model info and Prometheus metrics

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::{json, Value};
use serving_lib::{
    catalog, models_info,
    pipeline::{self, PREDICTIONS_SUFFIX},
    HealthResponse, ModelRegistry, PredictionError, ServingMetrics, StructuredLogger,
};
use std::sync::Arc;
use tracing::{error, info};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub metrics: ServingMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        registry: Arc<ModelRegistry>,
        metrics: ServingMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            registry,
            metrics,
            logger,
        }
    }
}

/// Error response wrapper
#[derive(Debug)]
pub struct ApiError(PredictionError);

impl From<PredictionError> for ApiError {
    fn from(e: PredictionError) -> Self {
        ApiError(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(PredictionError::InvalidRequest(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = match &self.0 {
            PredictionError::MissingFeatures { missing, required } => json!({
                "error": self.0.to_string(),
                "missing_features": missing,
                "required_features": required,
            }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Service description with feature lists and sample payloads
async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut features = serde_json::Map::new();
    let mut examples = serde_json::Map::new();
    for entry in state.registry.entries() {
        let name = entry.name();
        features.insert(name.to_string(), json!(entry.spec().contract.fields()));
        if let Some(payload) = catalog::example_payload(name) {
            examples.insert(format!("POST /predict/{}", name), payload);
        }
    }

    Json(json!({
        "service": "Model Prediction Service",
        "version": SERVER_VERSION,
        "endpoints": {
            "/": "GET - Service description",
            "/health": "GET - Model load status",
            "/models/info": "GET - Loaded model details",
            "/predict/<name>": "POST - Predict one record",
            "/predict/batch": "POST - Predict <name>_samples lists",
            "/metrics": "GET - Prometheus metrics",
        },
        "features": features,
        "examples": examples,
    }))
}

/// Health check response - returns 200 while any predictor is loaded, 503 otherwise
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = HealthResponse::from_registry(&state.registry);

    let status_code = if health.status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health))
}

async fn models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(models_info(&state.registry))
}

/// Run one record through a named predictor
async fn predict(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = body
        .map_err(ApiError::from)
        .and_then(|Json(value)| {
            pipeline::predict_value(&state.registry, &name, value, &state.metrics)
                .map_err(ApiError::from)
        });

    match outcome {
        Ok(result) => {
            state.logger.log_prediction(&name, &result);
            Ok(Json(result))
        }
        Err(e) => {
            state.logger.log_prediction_error(&name, &e.0);
            Err(e)
        }
    }
}

/// Run every `<name>_samples` list in the body
async fn predict_batch(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    let response = pipeline::run_batch(&state.registry, request, &state.metrics)?;

    for (key, items) in &response {
        let name = key.strip_suffix(PREDICTIONS_SUFFIX).unwrap_or(key);
        let failed = items.iter().filter(|item| !item.is_success()).count();
        state.logger.log_batch(name, items.len(), failed);
    }

    Ok(Json(response))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/models/info", get(models))
        .route("/predict/batch", post(predict_batch))
        .route("/predict/:name", post(predict))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Resolve once `signal` fires, logging the shutdown
///
/// A signal listener that fails to install never resolves, so the server
/// keeps running instead of stopping right after bind.
pub async fn shutdown_signal<F>(signal: F, logger: StructuredLogger)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => logger.log_shutdown("SIGINT received"),
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

/// Start the API server
pub async fn serve(
    addr: &str,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
