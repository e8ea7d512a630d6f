//! Artifact store: loads serialized models from the model directory
//!
//! This module provides:
//! - Per-predictor artifact locations relative to a root directory
//! - SHA256 validation against an optional `<artifact>.sha256` sidecar
//! - Format dispatch by predictor family and file extension

use crate::predictor::{
    KMeansClusterer, LinearRegressor, Model, OnnxClassifier, PredictorKind, PredictorSpec,
    RandomForestClassifier, StandardScaler,
};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Files backing one predictor
#[derive(Debug, Clone)]
pub struct ArtifactLocation {
    pub model: PathBuf,
    /// Scaler file, required for clusterers
    pub scaler: Option<PathBuf>,
}

/// Filesystem-backed artifact store
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    locations: HashMap<String, ArtifactLocation>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locations: HashMap::new(),
        }
    }

    /// Register artifact files for a predictor; relative paths resolve against the root
    pub fn with_artifact(
        mut self,
        name: impl Into<String>,
        model: impl AsRef<Path>,
        scaler: Option<&Path>,
    ) -> Self {
        let location = ArtifactLocation {
            model: self.resolve(model.as_ref()),
            scaler: scaler.map(|s| self.resolve(s)),
        };
        self.locations.insert(name.into(), location);
        self
    }

    pub fn location(&self, name: &str) -> Option<&ArtifactLocation> {
        self.locations.get(name)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Load the model for `spec` from its registered artifacts
    pub fn load(&self, spec: &PredictorSpec) -> Result<Model> {
        let location = self
            .locations
            .get(&spec.name)
            .with_context(|| format!("No artifact configured for predictor '{}'", spec.name))?;

        match spec.kind {
            PredictorKind::Classifier => load_classifier(spec, &location.model),
            PredictorKind::Clusterer => {
                let scaler_path = location
                    .scaler
                    .as_deref()
                    .with_context(|| {
                        format!("No scaler configured for predictor '{}'", spec.name)
                    })?;
                let scaler = StandardScaler::from_json(&read_text(scaler_path)?)
                    .with_context(|| format!("Invalid scaler {:?}", scaler_path))?;
                let model = KMeansClusterer::from_json(&read_text(&location.model)?, scaler)
                    .with_context(|| format!("Invalid K-Means model {:?}", location.model))?;
                Ok(Model::Clusterer(model))
            }
            PredictorKind::Regressor => {
                let model = LinearRegressor::from_json(&read_text(&location.model)?)
                    .with_context(|| format!("Invalid regression model {:?}", location.model))?;
                Ok(Model::Regressor(Box::new(model)))
            }
        }
    }
}

fn load_classifier(spec: &PredictorSpec, path: &Path) -> Result<Model> {
    let is_onnx = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("onnx"))
        .unwrap_or(false);

    if is_onnx {
        let n_classes = spec.class_labels.len().max(2);
        let classes = (0..n_classes as i64).collect();
        let model = OnnxClassifier::new(&read_verified(path)?, spec.contract.len(), classes)
            .with_context(|| format!("Invalid ONNX classifier {:?}", path))?;
        Ok(Model::Classifier(Box::new(model)))
    } else {
        let model = RandomForestClassifier::from_json(&read_text(path)?)
            .with_context(|| format!("Invalid random forest {:?}", path))?;
        Ok(Model::Classifier(Box::new(model)))
    }
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = read_verified(path)?;
    String::from_utf8(bytes).with_context(|| format!("Artifact {:?} is not UTF-8", path))
}

/// Read an artifact, validating its checksum when a sidecar exists
pub fn read_verified(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read artifact {:?}", path))?;

    let sidecar = checksum_path(path);
    if sidecar.exists() {
        let expected = fs::read_to_string(&sidecar)
            .with_context(|| format!("Failed to read checksum {:?}", sidecar))?;
        let expected = expected
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_lowercase();
        let actual = calculate_checksum(&bytes);
        if actual != expected {
            anyhow::bail!(
                "Checksum mismatch for {:?}: expected {}, got {}",
                path,
                expected,
                actual
            );
        }
        debug!(path = ?path, "Artifact checksum verified");
    }

    Ok(bytes)
}

/// Hex-encoded SHA256 of `data`
pub fn calculate_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn checksum_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}
