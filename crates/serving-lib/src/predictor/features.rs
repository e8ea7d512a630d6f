//! Feature contracts, request validation and row building
//!
//! A model is fit on a fixed column order, so every record is validated
//! against the contract and then laid out in exactly that order.

use crate::error::{PredictionError, Result};
use crate::models::FeatureRecord;
use ndarray::Array1;
use serde_json::Value;

/// Ordered list of input fields a predictor requires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureContract {
    fields: Vec<String>,
}

impl FeatureContract {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Required fields absent from the record, in contract order
    pub fn missing_features(&self, record: &FeatureRecord) -> Vec<String> {
        self.fields
            .iter()
            .filter(|field| !record.contains(field))
            .cloned()
            .collect()
    }

    /// Fail with `MissingFeatures` unless every required field is present
    pub fn validate(&self, record: &FeatureRecord) -> Result<()> {
        let missing = self.missing_features(record);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PredictionError::MissingFeatures {
                missing,
                required: self.fields.clone(),
            })
        }
    }

    /// Lay the record out as one numeric row in contract order
    pub fn build_row(&self, record: &FeatureRecord) -> Result<Array1<f64>> {
        let mut row = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = record.get(field).ok_or_else(|| PredictionError::MissingFeatures {
                missing: vec![field.clone()],
                required: self.fields.clone(),
            })?;
            row.push(coerce_numeric(field, value)?);
        }
        Ok(Array1::from_vec(row))
    }
}

/// Coerce a JSON value to a finite float
///
/// Numbers and numeric strings are accepted; everything else is an
/// invocation error.
pub fn coerce_numeric(field: &str, value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(PredictionError::invocation(format!(
            "feature '{}' must be finite, got {}",
            field, v
        ))),
        None => Err(PredictionError::invocation(format!(
            "feature '{}' could not be converted to a number: {}",
            field, value
        ))),
    }
}
