//! Prediction output formatting
//!
//! Turns raw model outputs into response structures with derived fields:
//! labels, confidence scores and centroid coordinates in original units.

use super::{ClassScores, ClusterAssignment, KMeansClusterer, PredictorSpec};
use crate::error::{PredictionError, Result};
use crate::models::{
    CentroidInfo, ClassificationResult, ClusteringResult, FeatureRecord, RegressionResult,
};
use std::collections::BTreeMap;

/// Relative-closeness score for a cluster assignment
///
/// `1 - d[assigned] / sum(d)`. This is a heuristic, not a calibrated
/// probability. A zero sum yields 1.0 when the assigned distance is zero
/// and an error otherwise.
pub fn clustering_confidence(assigned: usize, distances: &[f64]) -> Result<f64> {
    let distance = *distances.get(assigned).ok_or_else(|| {
        PredictionError::invocation(format!(
            "cluster {} out of range for {} distances",
            assigned,
            distances.len()
        ))
    })?;
    let total: f64 = distances.iter().sum();

    if !(total.is_finite() && total > 0.0) {
        return if distance == 0.0 {
            Ok(1.0)
        } else {
            Err(PredictionError::DegenerateConfidence {
                cluster: assigned,
                distance,
            })
        };
    }

    Ok((1.0 - distance / total).clamp(0.0, 1.0))
}

/// Formats raw outputs for one predictor
pub struct ResponseFormatter<'a> {
    spec: &'a PredictorSpec,
}

impl<'a> ResponseFormatter<'a> {
    pub fn new(spec: &'a PredictorSpec) -> Self {
        Self { spec }
    }

    fn class_label(&self, class_index: usize, class_value: i64) -> String {
        self.spec
            .class_labels
            .get(class_index)
            .cloned()
            .unwrap_or_else(|| class_value.to_string())
    }

    pub fn classification(
        &self,
        classes: &[i64],
        scores: ClassScores,
        input: FeatureRecord,
    ) -> Result<ClassificationResult> {
        if scores.probabilities.len() != classes.len() {
            return Err(PredictionError::invocation(format!(
                "{} probabilities for {} classes",
                scores.probabilities.len(),
                classes.len()
            )));
        }
        let prediction = *classes.get(scores.class_index).ok_or_else(|| {
            PredictionError::invocation(format!(
                "class index {} out of range for {} classes",
                scores.class_index,
                classes.len()
            ))
        })?;

        let probability = classes
            .iter()
            .zip(&scores.probabilities)
            .enumerate()
            .map(|(i, (&class, &p))| (self.class_label(i, class), p))
            .collect::<BTreeMap<_, _>>();

        Ok(ClassificationResult {
            model: self.spec.model_name.clone(),
            label: self.class_label(scores.class_index, prediction),
            prediction,
            confidence: scores.confidence(),
            probability,
            input_features: input,
        })
    }

    pub fn clustering(
        &self,
        model: &KMeansClusterer,
        assignment: ClusterAssignment,
        input: FeatureRecord,
    ) -> Result<ClusteringResult> {
        let confidence = clustering_confidence(assignment.cluster, &assignment.distances)?;
        let fields = self.spec.contract.fields();
        let meanings = &self.spec.cluster_meanings;

        let all_centroids: Vec<CentroidInfo> = model
            .centroids_original()
            .outer_iter()
            .enumerate()
            .map(|(cluster, centroid)| CentroidInfo {
                cluster,
                meaning: meanings.describe(cluster),
                coordinates: fields.iter().cloned().zip(centroid.iter().copied()).collect(),
            })
            .collect();

        let centroid_coordinates = all_centroids
            .get(assignment.cluster)
            .map(|c| c.coordinates.clone())
            .ok_or_else(|| {
                PredictionError::invocation(format!(
                    "no centroid for cluster {}",
                    assignment.cluster
                ))
            })?;

        Ok(ClusteringResult {
            model: self.spec.model_name.clone(),
            cluster: assignment.cluster,
            cluster_meaning: meanings.describe(assignment.cluster),
            confidence,
            distances_to_centroids: assignment.distances,
            centroid_coordinates,
            all_centroids,
            input_features: input,
        })
    }

    pub fn regression(&self, prediction: f64, input: FeatureRecord) -> Result<RegressionResult> {
        if !prediction.is_finite() {
            return Err(PredictionError::invocation("regression output is not finite"));
        }
        Ok(RegressionResult {
            model: self.spec.model_name.clone(),
            prediction,
            input_features: input,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{ClusterMeanings, FeatureContract, PredictorKind, StandardScaler};
    use ndarray::array;
    use serde_json::json;

    fn spec(kind: PredictorKind) -> PredictorSpec {
        PredictorSpec {
            name: "test".into(),
            model_name: "test_model".into(),
            kind,
            contract: FeatureContract::new(["annual_income", "spending_score"]),
            class_labels: vec!["Bad (<6)".into(), "Good (≥6)".into()],
            cluster_meanings: ClusterMeanings::new([(0, "Low"), (1, "High")]),
        }
    }

    fn input() -> FeatureRecord {
        FeatureRecord::from_value(json!({"annual_income": 50, "spending_score": 60, "id": "c-1"}))
            .unwrap()
    }

    #[test]
    fn test_confidence_formula() {
        let c = clustering_confidence(0, &[1.0, 3.0]).unwrap();
        assert!((c - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_zero_sum_is_one() {
        assert_eq!(clustering_confidence(1, &[0.0, 0.0, 0.0]).unwrap(), 1.0);
    }

    #[test]
    fn test_confidence_degenerate_is_error() {
        // Negative distances cannot come from a metric, but the sum can still be zero
        let err = clustering_confidence(0, &[1.0, -1.0]).unwrap_err();
        assert!(matches!(err, PredictionError::DegenerateConfidence { cluster: 0, .. }));
    }

    #[test]
    fn test_confidence_in_unit_interval() {
        let cases: [&[f64]; 4] = [&[0.1, 5.0], &[2.0, 2.0], &[0.0, 1.0, 2.0], &[9.0, 0.5, 0.5]];
        for distances in cases {
            for assigned in 0..distances.len() {
                let c = clustering_confidence(assigned, distances).unwrap();
                assert!((0.0..=1.0).contains(&c), "{:?} -> {}", distances, c);
            }
        }
    }

    #[test]
    fn test_confidence_out_of_range_cluster() {
        assert!(matches!(
            clustering_confidence(3, &[1.0]).unwrap_err(),
            PredictionError::Invocation(_)
        ));
    }

    #[test]
    fn test_classification_labels_and_confidence() {
        let spec = spec(PredictorKind::Classifier);
        let formatter = ResponseFormatter::new(&spec);
        let scores = ClassScores::from_probabilities(vec![0.35, 0.65]);

        let result = formatter.classification(&[0, 1], scores, input()).unwrap();
        assert_eq!(result.label, "Good (≥6)");
        assert_eq!(result.prediction, 1);
        assert_eq!(result.confidence, 0.65);
        assert_eq!(result.probability["Bad (<6)"], 0.35);
        assert_eq!(result.probability["Good (≥6)"], 0.65);
        assert_eq!(result.input_features.get("id"), Some(&json!("c-1")));
    }

    #[test]
    fn test_clustering_reports_all_centroids() {
        let spec = spec(PredictorKind::Clusterer);
        let scaler = StandardScaler::new(vec![50.0, 50.0], vec![10.0, 10.0]).unwrap();
        let model = KMeansClusterer::new(array![[-1.0, -1.0], [1.0, 1.0]], scaler).unwrap();
        let assignment = model.predict(array![[58.0, 61.0]].view()).unwrap().remove(0);

        let result = ResponseFormatter::new(&spec)
            .clustering(&model, assignment, input())
            .unwrap();

        assert_eq!(result.cluster, 1);
        assert_eq!(result.cluster_meaning, "High");
        assert_eq!(result.all_centroids.len(), 2);
        assert_eq!(result.all_centroids[0].coordinates["annual_income"], 40.0);
        assert_eq!(result.centroid_coordinates["spending_score"], 60.0);
        assert!(result.confidence > 0.5 && result.confidence <= 1.0);

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["all_centroids"][1]["meaning"], "High");
        assert_eq!(value["all_centroids"][1]["annual_income"], 60.0);
    }

    #[test]
    fn test_classification_without_classes_is_error() {
        let spec = spec(PredictorKind::Classifier);
        let formatter = ResponseFormatter::new(&spec);
        let scores = ClassScores::from_probabilities(vec![]);

        let err = formatter.classification(&[], scores, input()).unwrap_err();
        assert!(matches!(err, PredictionError::Invocation(_)));
    }

    #[test]
    fn test_regression_rejects_nan() {
        let spec = spec(PredictorKind::Regressor);
        let formatter = ResponseFormatter::new(&spec);
        assert!(formatter.regression(f64::NAN, input()).is_err());
        assert_eq!(formatter.regression(2.5, input()).unwrap().prediction, 2.5);
    }
}
