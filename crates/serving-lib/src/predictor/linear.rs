//! Linear regression loaded from a JSON export

use anyhow::{Context, Result};
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModelData {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

#[derive(Debug, Clone)]
pub struct LinearRegressor {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LinearRegressor {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Result<Self> {
        if coefficients.is_empty() {
            anyhow::bail!("Linear model has no coefficients");
        }
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            anyhow::bail!("Linear model parameters must be finite");
        }
        Ok(Self {
            coefficients: Array1::from_vec(coefficients),
            intercept,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let data: LinearModelData =
            serde_json::from_str(json).context("Failed to parse linear model JSON")?;
        Self::new(data.coefficients, data.intercept)
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    pub fn predict(&self, rows: ArrayView2<f64>) -> Result<Vec<f64>> {
        if rows.ncols() != self.n_features() {
            anyhow::bail!(
                "Row has {} features, model expects {}",
                rows.ncols(),
                self.n_features()
            );
        }
        let out = rows.dot(&self.coefficients) + self.intercept;
        if out.iter().any(|v| !v.is_finite()) {
            anyhow::bail!("Regression output is not finite");
        }
        Ok(out.to_vec())
    }
}
