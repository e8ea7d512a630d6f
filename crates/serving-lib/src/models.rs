//! Core data models for the prediction service

use crate::error::{PredictionError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Caller-supplied record mapping field names to values
///
/// Extra fields are kept so they can be echoed back in responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureRecord(Map<String, Value>);

impl FeatureRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Accept any JSON value, rejecting everything but objects
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(PredictionError::InvalidRequest(format!(
                "expected a JSON object of features, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Classifier output for one record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub model: String,
    #[serde(rename = "quality")]
    pub label: String,
    pub prediction: i64,
    pub probability: BTreeMap<String, f64>,
    pub confidence: f64,
    pub input_features: FeatureRecord,
}

/// One cluster centroid in original feature units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentroidInfo {
    pub cluster: usize,
    pub meaning: String,
    #[serde(flatten)]
    pub coordinates: BTreeMap<String, f64>,
}

/// Clusterer output for one record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub model: String,
    pub cluster: usize,
    pub cluster_meaning: String,
    pub confidence: f64,
    pub distances_to_centroids: Vec<f64>,
    pub centroid_coordinates: BTreeMap<String, f64>,
    pub all_centroids: Vec<CentroidInfo>,
    pub input_features: FeatureRecord,
}

/// Regressor output for one record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionResult {
    pub model: String,
    pub prediction: f64,
    pub input_features: FeatureRecord,
}

/// Formatted output of one pipeline run
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PredictionResult {
    Classification(ClassificationResult),
    Clustering(ClusteringResult),
    Regression(RegressionResult),
}

impl PredictionResult {
    pub fn confidence(&self) -> Option<f64> {
        match self {
            PredictionResult::Classification(r) => Some(r.confidence),
            PredictionResult::Clustering(r) => Some(r.confidence),
            PredictionResult::Regression(_) => None,
        }
    }
}

/// Error entry of a batch item
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_features: Option<Vec<String>>,
}

impl From<&PredictionError> for BatchFailure {
    fn from(err: &PredictionError) -> Self {
        let missing_features = match err {
            PredictionError::MissingFeatures { missing, .. } => Some(missing.clone()),
            _ => None,
        };
        Self {
            error: err.to_string(),
            missing_features,
        }
    }
}

/// Outcome of one batch element
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchOutcome {
    Success(PredictionResult),
    Failure(BatchFailure),
}

/// One element of a batch response, tagged with its input position
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub sample_index: usize,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

impl BatchItem {
    pub fn success(sample_index: usize, result: PredictionResult) -> Self {
        Self {
            sample_index,
            outcome: BatchOutcome::Success(result),
        }
    }

    pub fn failure(sample_index: usize, err: &PredictionError) -> Self {
        Self {
            sample_index,
            outcome: BatchOutcome::Failure(err.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feature_record_rejects_non_objects() {
        let err = FeatureRecord::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, PredictionError::InvalidRequest(_)));
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_batch_failure_serializes_missing_features() {
        let err = PredictionError::MissingFeatures {
            missing: vec!["alcohol".into()],
            required: vec!["density".into(), "alcohol".into()],
        };
        let item = BatchItem::failure(3, &err);
        let value = serde_json::to_value(&item).unwrap();

        assert_eq!(value["sample_index"], 3);
        assert_eq!(value["missing_features"], json!(["alcohol"]));
        assert!(value["error"].as_str().unwrap().contains("alcohol"));
    }

    #[test]
    fn test_batch_success_flattens_result() {
        let record = FeatureRecord::from_value(json!({"area": 50.0})).unwrap();
        let item = BatchItem::success(
            0,
            PredictionResult::Regression(RegressionResult {
                model: "house_price".into(),
                prediction: 1.5,
                input_features: record,
            }),
        );
        let value = serde_json::to_value(&item).unwrap();

        assert_eq!(value["sample_index"], 0);
        assert_eq!(value["prediction"], 1.5);
        assert_eq!(value["input_features"]["area"], 50.0);
        assert!(value.get("error").is_none());
    }
}
