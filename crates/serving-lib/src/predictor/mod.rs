//! Predictors: loaded models behind a per-family capability interface
//!
//! Callers branch on [`Model`] rather than probing what a model supports.

mod features;
mod forest;
mod inference;
mod kmeans;
mod linear;
mod output;

pub use features::{coerce_numeric, FeatureContract};
pub use forest::{DecisionTree, ForestModelData, RandomForestClassifier, TreeNode};
pub use inference::OnnxClassifier;
pub use kmeans::{
    ClusterAssignment, KMeansClusterer, KMeansModelData, ScalerModelData, StandardScaler,
};
pub use linear::{LinearModelData, LinearRegressor};
pub use output::{clustering_confidence, ResponseFormatter};

use anyhow::Result;
use ndarray::ArrayView2;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictorKind {
    Classifier,
    Clusterer,
    Regressor,
}

impl fmt::Display for PredictorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictorKind::Classifier => write!(f, "classifier"),
            PredictorKind::Clusterer => write!(f, "clusterer"),
            PredictorKind::Regressor => write!(f, "regressor"),
        }
    }
}

/// Predicted class and the full probability vector for one row
#[derive(Debug, Clone, PartialEq)]
pub struct ClassScores {
    pub class_index: usize,
    pub probabilities: Vec<f64>,
}

impl ClassScores {
    /// Pick the most probable class; ties go to the lowest index
    pub fn from_probabilities(probabilities: Vec<f64>) -> Self {
        let class_index = probabilities
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
            .0;
        Self {
            class_index,
            probabilities,
        }
    }

    /// Highest class probability
    pub fn confidence(&self) -> f64 {
        self.probabilities
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Classifier models (predict with probabilities)
pub trait Classifier: Send + Sync {
    /// Scores for each row of `rows`
    fn predict(&self, rows: ArrayView2<f64>) -> Result<Vec<ClassScores>>;

    /// Class values in probability-vector order
    fn classes(&self) -> &[i64];

    fn n_features(&self) -> usize;

    /// Type tag reported by the info endpoint
    fn model_type(&self) -> &'static str;

    /// Number of ensemble members, when the model is an ensemble
    fn n_estimators(&self) -> Option<usize> {
        None
    }
}

impl Classifier for RandomForestClassifier {
    fn predict(&self, rows: ArrayView2<f64>) -> Result<Vec<ClassScores>> {
        RandomForestClassifier::predict(self, rows)
    }

    fn classes(&self) -> &[i64] {
        RandomForestClassifier::classes(self)
    }

    fn n_features(&self) -> usize {
        RandomForestClassifier::n_features(self)
    }

    fn model_type(&self) -> &'static str {
        "RandomForestClassifier"
    }

    fn n_estimators(&self) -> Option<usize> {
        Some(RandomForestClassifier::n_estimators(self))
    }
}

/// Regression models (one continuous value per row)
pub trait Regressor: Send + Sync {
    fn predict(&self, rows: ArrayView2<f64>) -> Result<Vec<f64>>;

    fn n_features(&self) -> usize;

    fn model_type(&self) -> &'static str;
}

impl Regressor for LinearRegressor {
    fn predict(&self, rows: ArrayView2<f64>) -> Result<Vec<f64>> {
        LinearRegressor::predict(self, rows)
    }

    fn n_features(&self) -> usize {
        LinearRegressor::n_features(self)
    }

    fn model_type(&self) -> &'static str {
        "LinearRegression"
    }
}

/// A loaded model, by family
pub enum Model {
    Classifier(Box<dyn Classifier>),
    Clusterer(KMeansClusterer),
    Regressor(Box<dyn Regressor>),
}

impl Model {
    pub fn kind(&self) -> PredictorKind {
        match self {
            Model::Classifier(_) => PredictorKind::Classifier,
            Model::Clusterer(_) => PredictorKind::Clusterer,
            Model::Regressor(_) => PredictorKind::Regressor,
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Model::Classifier(c) => c.n_features(),
            Model::Clusterer(k) => k.n_features(),
            Model::Regressor(r) => r.n_features(),
        }
    }

    pub fn model_type(&self) -> &'static str {
        match self {
            Model::Classifier(c) => c.model_type(),
            Model::Clusterer(_) => "KMeans",
            Model::Regressor(r) => r.model_type(),
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("kind", &self.kind())
            .field("model_type", &self.model_type())
            .field("n_features", &self.n_features())
            .finish()
    }
}

/// Static description of what a cluster index means
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClusterMeanings(BTreeMap<usize, String>);

impl ClusterMeanings {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        Self(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
    }

    /// Description for `cluster`, or `"Cluster <k>"` when none is defined
    pub fn describe(&self, cluster: usize) -> String {
        self.0
            .get(&cluster)
            .cloned()
            .unwrap_or_else(|| format!("Cluster {}", cluster))
    }
}

/// Everything about a predictor that is fixed before any artifact loads
#[derive(Debug, Clone)]
pub struct PredictorSpec {
    /// Logical name used in routes and batch keys
    pub name: String,
    /// Name reported in the `model` field of responses
    pub model_name: String,
    pub kind: PredictorKind,
    pub contract: FeatureContract,
    /// Human-readable label per class index (classifiers)
    pub class_labels: Vec<String>,
    /// Cluster descriptions (clusterers)
    pub cluster_meanings: ClusterMeanings,
}

/// A spec paired with its loaded model
#[derive(Debug)]
pub struct Predictor {
    spec: PredictorSpec,
    model: Model,
}

impl Predictor {
    /// Pair a spec with a model, checking that the two agree
    pub fn new(spec: PredictorSpec, model: Model) -> Result<Self> {
        if spec.kind != model.kind() {
            anyhow::bail!(
                "Predictor '{}' is a {} but the artifact is a {}",
                spec.name,
                spec.kind,
                model.kind()
            );
        }
        if spec.contract.len() != model.n_features() {
            anyhow::bail!(
                "Predictor '{}' requires {} features but the model takes {}",
                spec.name,
                spec.contract.len(),
                model.n_features()
            );
        }
        if let Model::Classifier(c) = &model {
            if !spec.class_labels.is_empty() && spec.class_labels.len() != c.classes().len() {
                anyhow::bail!(
                    "Predictor '{}' has {} class labels but the model has {} classes",
                    spec.name,
                    spec.class_labels.len(),
                    c.classes().len()
                );
            }
        }
        Ok(Self { spec, model })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &PredictorSpec {
        &self.spec
    }

    pub fn contract(&self) -> &FeatureContract {
        &self.spec.contract
    }

    pub fn model(&self) -> &Model {
        &self.model
    }
}
