//! Observability infrastructure for the prediction service
//!
//! Provides:
//! - Prometheus metrics (prediction latency, prediction and error counts, loaded models)
//! - Structured JSON logging with tracing

use crate::error::PredictionError;
use crate::models::PredictionResult;
use crate::registry::ModelRegistry;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServingMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct ServingMetricsInner {
    prediction_latency_seconds: HistogramVec,
    predictions_total: IntCounterVec,
    prediction_errors_total: IntCounterVec,
    models_loaded: IntGaugeVec,
}

impl ServingMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram_vec!(
                "model_server_prediction_latency_seconds",
                "Time spent running the prediction pipeline for one record",
                &["predictor"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "model_server_predictions_total",
                "Total number of successful predictions",
                &["predictor"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "model_server_prediction_errors_total",
                "Total number of failed predictions by error kind",
                &["predictor", "kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            models_loaded: register_int_gauge_vec!(
                "model_server_model_loaded",
                "Whether a predictor's artifacts are loaded (1) or not (0)",
                &["predictor", "model_type"]
            )
            .expect("Failed to register model_loaded"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServingMetrics {
    _private: (),
}

impl Default for ServingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServingMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServingMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServingMetricsInner {
        GLOBAL_METRICS.get_or_init(ServingMetricsInner::new)
    }

    /// Record one pipeline run
    pub fn record_outcome(
        &self,
        predictor: &str,
        error: Option<&PredictionError>,
        duration_secs: f64,
    ) {
        let inner = self.inner();
        inner
            .prediction_latency_seconds
            .with_label_values(&[predictor])
            .observe(duration_secs);
        match error {
            None => inner.predictions_total.with_label_values(&[predictor]).inc(),
            Some(e) => inner
                .prediction_errors_total
                .with_label_values(&[predictor, e.kind()])
                .inc(),
        }
    }

    /// Publish the load state of every registry entry
    pub fn set_registry(&self, registry: &ModelRegistry) {
        let gauge = &self.inner().models_loaded;
        gauge.reset();
        for entry in registry.entries() {
            let model_type = entry
                .predictor()
                .map(|p| p.model().model_type())
                .unwrap_or("none");
            gauge
                .with_label_values(&[entry.name(), model_type])
                .set(entry.is_loaded() as i64);
        }
    }
}

/// Structured logger for service events
///
/// Provides consistent JSON-formatted logging for startup, model loading,
/// predictions and shutdown.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log service startup
    pub fn log_startup(&self, version: &str, model_dir: &str) {
        info!(
            event = "server_started",
            instance = %self.instance,
            version = %version,
            model_dir = %model_dir,
            "Model server started"
        );
    }

    /// Log the load outcome of every configured predictor
    pub fn log_registry(&self, registry: &ModelRegistry) {
        for entry in registry.entries() {
            match entry.predictor() {
                Some(predictor) => info!(
                    event = "model_loaded",
                    instance = %self.instance,
                    predictor = %entry.name(),
                    kind = %entry.spec().kind,
                    model_type = predictor.model().model_type(),
                    n_features = predictor.model().n_features(),
                    "Model loaded"
                ),
                None => warn!(
                    event = "model_load_failed",
                    instance = %self.instance,
                    predictor = %entry.name(),
                    kind = %entry.spec().kind,
                    error = entry.load_error().unwrap_or("unknown"),
                    "Model unavailable, requests to it will fail"
                ),
            }
        }
    }

    /// Log a single prediction
    pub fn log_prediction(&self, predictor: &str, result: &PredictionResult) {
        info!(
            event = "prediction_generated",
            instance = %self.instance,
            predictor = %predictor,
            confidence = ?result.confidence(),
            "Generated prediction"
        );
    }

    /// Log a rejected or failed prediction
    pub fn log_prediction_error(&self, predictor: &str, error: &PredictionError) {
        warn!(
            event = "prediction_failed",
            instance = %self.instance,
            predictor = %predictor,
            kind = error.kind(),
            error = %error,
            "Prediction failed"
        );
    }

    /// Log a batch summary
    pub fn log_batch(&self, predictor: &str, total: usize, failed: usize) {
        info!(
            event = "batch_processed",
            instance = %self.instance,
            predictor = %predictor,
            total = total,
            failed = failed,
            "Processed batch"
        );
    }

    /// Log service shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Model server shutting down"
        );
    }
}
