//! Model descriptions for the info endpoint

use crate::predictor::{ClusterMeanings, Model, PredictorKind};
use crate::registry::{ModelRegistry, RegistryEntry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Description of one loaded predictor
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub kind: PredictorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_estimators: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_clusters: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_coefficients: Option<usize>,
    pub features: Vec<String>,
    pub n_features: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_meanings: Option<ClusterMeanings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
}

impl ModelInfo {
    /// `None` when the entry's artifacts are not loaded
    pub fn from_entry(entry: &RegistryEntry) -> Option<Self> {
        let predictor = entry.predictor()?;
        let spec = predictor.spec();
        let model = predictor.model();

        let mut info = ModelInfo {
            model_type: model.model_type().to_string(),
            kind: model.kind(),
            n_estimators: None,
            n_clusters: None,
            n_coefficients: None,
            features: spec.contract.fields().to_vec(),
            n_features: spec.contract.len(),
            classes: None,
            cluster_meanings: None,
            loaded_at: entry.loaded_at(),
        };

        match model {
            Model::Classifier(c) => {
                info.n_estimators = c.n_estimators();
                info.classes = Some(if spec.class_labels.is_empty() {
                    c.classes().iter().map(|c| c.to_string()).collect()
                } else {
                    spec.class_labels.clone()
                });
            }
            Model::Clusterer(k) => {
                info.n_clusters = Some(k.n_clusters());
                info.cluster_meanings = Some(spec.cluster_meanings.clone());
            }
            Model::Regressor(r) => {
                info.n_coefficients = Some(r.n_features());
            }
        }

        Some(info)
    }
}

/// `GET /models/info` body, keyed by predictor name
pub type ModelsInfo = BTreeMap<String, Option<ModelInfo>>;

pub fn models_info(registry: &ModelRegistry) -> ModelsInfo {
    registry
        .entries()
        .iter()
        .map(|e| (e.name().to_string(), ModelInfo::from_entry(e)))
        .collect()
}
