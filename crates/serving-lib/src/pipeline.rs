//! Prediction request pipeline
//!
//! validate → build row → invoke → format, for one record or for each
//! element of a batch. Batch elements fail independently and results keep
//! input order.

use crate::error::{PredictionError, Result};
use crate::models::{BatchItem, FeatureRecord, PredictionResult};
use crate::observability::ServingMetrics;
use crate::predictor::{Model, Predictor, ResponseFormatter};
use crate::registry::ModelRegistry;
use ndarray::Axis;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

/// Suffix of batch request keys (`wine_samples`)
pub const SAMPLES_SUFFIX: &str = "_samples";

/// Suffix of batch response keys (`wine_predictions`)
pub const PREDICTIONS_SUFFIX: &str = "_predictions";

/// Metric label for requests naming no configured predictor
pub const UNKNOWN_PREDICTOR_LABEL: &str = "unknown";

/// Metric label for `name`: itself when configured, a fixed label otherwise
///
/// Keeps caller-supplied names out of the metric registry.
pub fn metric_label<'a>(registry: &'a ModelRegistry, name: &str) -> &'a str {
    registry
        .entry(name)
        .map(|entry| entry.name())
        .unwrap_or(UNKNOWN_PREDICTOR_LABEL)
}

/// Run the full pipeline for one record
pub fn predict(predictor: &Predictor, record: FeatureRecord) -> Result<PredictionResult> {
    let contract = predictor.contract();
    contract.validate(&record)?;

    let row = contract.build_row(&record)?;
    let rows = row.insert_axis(Axis(0));
    let formatter = ResponseFormatter::new(predictor.spec());

    let result = match predictor.model() {
        Model::Classifier(classifier) => {
            let scores = first(classifier.predict(rows.view())?)?;
            PredictionResult::Classification(formatter.classification(
                classifier.classes(),
                scores,
                record,
            )?)
        }
        Model::Clusterer(clusterer) => {
            let assignment = first(clusterer.predict(rows.view())?)?;
            PredictionResult::Clustering(formatter.clustering(clusterer, assignment, record)?)
        }
        Model::Regressor(regressor) => {
            let value = first(regressor.predict(rows.view())?)?;
            PredictionResult::Regression(formatter.regression(value, record)?)
        }
    };

    Ok(result)
}

fn first<T>(outputs: Vec<T>) -> Result<T> {
    outputs
        .into_iter()
        .next()
        .ok_or_else(|| PredictionError::invocation("model returned no output for the row"))
}

/// Look up a predictor and run the pipeline on a raw JSON value, recording metrics
pub fn predict_value(
    registry: &ModelRegistry,
    name: &str,
    value: Value,
    metrics: &ServingMetrics,
) -> Result<PredictionResult> {
    let start = Instant::now();
    let outcome = registry
        .get(name)
        .and_then(|predictor| FeatureRecord::from_value(value).and_then(|r| predict(predictor, r)));
    metrics.record_outcome(
        metric_label(registry, name),
        outcome.as_ref().err(),
        start.elapsed().as_secs_f64(),
    );
    outcome
}

/// Apply the pipeline to each sample independently
///
/// `predictor` is the registry lookup result; when it failed, every sample
/// carries that error.
pub fn predict_batch(
    name: &str,
    predictor: Result<&Predictor>,
    samples: Vec<Value>,
    metrics: &ServingMetrics,
) -> Vec<BatchItem> {
    let label = match &predictor {
        Err(PredictionError::UnknownPredictor { .. }) => UNKNOWN_PREDICTOR_LABEL,
        _ => name,
    };
    samples
        .into_iter()
        .enumerate()
        .map(|(idx, sample)| {
            let start = Instant::now();
            let outcome = predictor
                .clone()
                .and_then(|p| FeatureRecord::from_value(sample).and_then(|r| predict(p, r)));
            metrics.record_outcome(label, outcome.as_ref().err(), start.elapsed().as_secs_f64());

            match outcome {
                Ok(result) => BatchItem::success(idx, result),
                Err(e) => {
                    debug!(
                        predictor = %name,
                        sample_index = idx,
                        error = %e,
                        "Batch sample failed"
                    );
                    BatchItem::failure(idx, &e)
                }
            }
        })
        .collect()
}

/// Batch response: one ordered list per predictor family present in the request
pub type BatchResponse = BTreeMap<String, Vec<BatchItem>>;

/// Run every `<name>_samples` list of a batch request
///
/// Keys without the `_samples` suffix are ignored. A `<name>_samples`
/// value that is not an array is an invalid request.
pub fn run_batch(
    registry: &ModelRegistry,
    request: Value,
    metrics: &ServingMetrics,
) -> Result<BatchResponse> {
    let fields: Map<String, Value> = match request {
        Value::Object(fields) => fields,
        _ => {
            return Err(PredictionError::InvalidRequest(
                "batch body must be a JSON object of <name>_samples arrays".to_string(),
            ))
        }
    };

    let mut groups = Vec::new();
    for (key, value) in fields {
        let Some(name) = key.strip_suffix(SAMPLES_SUFFIX) else {
            continue;
        };
        match value {
            Value::Array(samples) => groups.push((name.to_string(), samples)),
            _ => {
                return Err(PredictionError::InvalidRequest(format!(
                    "'{}' must be an array of samples",
                    key
                )))
            }
        }
    }

    let mut response = BatchResponse::new();
    for (name, samples) in groups {
        let items = predict_batch(&name, registry.get(&name), samples, metrics);
        response.insert(format!("{}{}", name, PREDICTIONS_SUFFIX), items);
    }
    Ok(response)
}
