//! Error taxonomy for the prediction pipeline

use thiserror::Error;

/// Failure of a single prediction request or batch item
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    /// No predictor with this name is configured
    #[error("Unknown predictor '{name}'")]
    UnknownPredictor { name: String },

    /// The predictor is configured but its artifacts failed to load
    #[error("Predictor '{name}' is not loaded")]
    UnavailablePredictor { name: String },

    /// Request body or batch sample is not a JSON object
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Required fields are absent from the record
    #[error("Missing features: {missing:?}")]
    MissingFeatures {
        missing: Vec<String>,
        required: Vec<String>,
    },

    /// Any failure while building the row or running the model
    #[error("Prediction failed: {0}")]
    Invocation(String),

    /// Clustering confidence has a zero denominator and a non-zero numerator
    #[error(
        "Confidence undefined for cluster {cluster}: distance {distance} with zero distance sum"
    )]
    DegenerateConfidence { cluster: usize, distance: f64 },
}

impl PredictionError {
    pub fn invocation(message: impl Into<String>) -> Self {
        PredictionError::Invocation(message.into())
    }

    /// HTTP status code this error maps to
    pub fn status_code(&self) -> u16 {
        match self {
            PredictionError::UnknownPredictor { .. } => 404,
            PredictionError::InvalidRequest(_) | PredictionError::MissingFeatures { .. } => 400,
            PredictionError::UnavailablePredictor { .. }
            | PredictionError::Invocation(_)
            | PredictionError::DegenerateConfidence { .. } => 500,
        }
    }

    /// Short stable label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::UnknownPredictor { .. } => "unknown_predictor",
            PredictionError::UnavailablePredictor { .. } => "unavailable_predictor",
            PredictionError::InvalidRequest(_) => "invalid_request",
            PredictionError::MissingFeatures { .. } => "missing_features",
            PredictionError::Invocation(_) => "invocation",
            PredictionError::DegenerateConfidence { .. } => "degenerate_confidence",
        }
    }
}

impl From<anyhow::Error> for PredictionError {
    fn from(err: anyhow::Error) -> Self {
        PredictionError::Invocation(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, PredictionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            PredictionError::UnknownPredictor { name: "x".into() }.status_code(),
            404
        );
        assert_eq!(
            PredictionError::MissingFeatures {
                missing: vec!["a".into()],
                required: vec!["a".into()],
            }
            .status_code(),
            400
        );
        assert_eq!(
            PredictionError::UnavailablePredictor { name: "wine".into() }.status_code(),
            500
        );
        assert_eq!(PredictionError::invocation("bad").status_code(), 500);
    }

    #[test]
    fn test_missing_features_message_lists_fields() {
        let err = PredictionError::MissingFeatures {
            missing: vec!["spending_score".into()],
            required: vec!["annual_income".into(), "spending_score".into()],
        };
        assert_eq!(err.to_string(), "Missing features: [\"spending_score\"]");
    }
}
