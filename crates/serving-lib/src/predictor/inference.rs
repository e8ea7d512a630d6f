//! ONNX classifier inference using tract
//!
//! Expects a classifier exported without a ZipMap stage: input `[1, n]`
//! float32, outputs `label` and `probabilities` (`[1, n_classes]`). Only the
//! probability tensor is read; the label is recomputed from it.

use super::{ClassScores, Classifier};
use anyhow::{Context, Result};
use ndarray::{ArrayView1, ArrayView2};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX-backed classifier
pub struct OnnxClassifier {
    model: TractModel,
    n_features: usize,
    classes: Vec<i64>,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
}

impl OnnxClassifier {
    /// Load a classifier from ONNX bytes
    ///
    /// `classes` gives the class value for each probability column.
    pub fn new(model_bytes: &[u8], n_features: usize, classes: Vec<i64>) -> Result<Self> {
        if classes.len() < 2 {
            anyhow::bail!("ONNX classifier needs at least 2 classes, got {}", classes.len());
        }
        let model = Self::load_model(model_bytes, n_features)?;
        Ok(Self::from_plan(model, n_features, classes))
    }

    fn from_plan(model: TractModel, n_features: usize, classes: Vec<i64>) -> Self {
        Self {
            model,
            n_features,
            classes,
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
        }
    }

    /// Load and optimize an ONNX model from bytes
    fn load_model(model_bytes: &[u8], n_features: usize) -> Result<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, n_features]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(model)
    }

    fn row_to_tensor(&self, row: ArrayView1<f64>) -> Result<Tensor> {
        let data: Vec<f32> = row.iter().map(|v| *v as f32).collect();
        let array = tract_ndarray::Array2::from_shape_vec((1, self.n_features), data)
            .context("Row does not match model input shape")?;
        Ok(array.into())
    }

    fn run_row(&self, row: ArrayView1<f64>) -> Result<ClassScores> {
        let start = Instant::now();
        let input = self.row_to_tensor(row)?;
        let outputs = self.model.run(tvec!(input.into()))?;

        let elapsed = start.elapsed();
        let total = self.inference_count.fetch_add(1, Ordering::Relaxed) + 1;
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            let slow = self.slow_inference_count.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                elapsed_ms = elapsed.as_millis(),
                slow_inferences = slow,
                total_inferences = total,
                "Inference exceeded {}ms target",
                MAX_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        scores_from_outputs(&outputs, self.classes.len())
    }
}

/// Read the probability output; it is the last output of the graph
fn scores_from_outputs(outputs: &TVec<TValue>, n_classes: usize) -> Result<ClassScores> {
    let output = outputs.last().context("No output from model")?;
    let view = output
        .to_array_view::<f32>()
        .context("Probability output is not float32")?;
    let values: Vec<f64> = view.iter().map(|v| *v as f64).collect();

    if values.len() != n_classes {
        anyhow::bail!(
            "Model output has {} values, expected {}",
            values.len(),
            n_classes
        );
    }
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        anyhow::bail!("Model produced invalid probabilities: {:?}", values);
    }
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        anyhow::bail!("Model produced an all-zero probability vector");
    }
    Ok(ClassScores::from_probabilities(
        values.into_iter().map(|v| v / total).collect(),
    ))
}

impl Classifier for OnnxClassifier {
    fn predict(&self, rows: ArrayView2<f64>) -> Result<Vec<ClassScores>> {
        if rows.ncols() != self.n_features {
            anyhow::bail!(
                "Row has {} features, model expects {}",
                rows.ncols(),
                self.n_features
            );
        }
        rows.outer_iter().map(|row| self.run_row(row)).collect()
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn model_type(&self) -> &'static str {
        "OnnxClassifier"
    }
}
