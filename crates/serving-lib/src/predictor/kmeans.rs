//! K-Means clustering with a pre-fit standard scaler
//!
//! Inference only. Centroids live in scaled space; rows are scaled before
//! distances are taken and centroids are inverse-scaled for reporting.

use anyhow::{Context, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Serialized standard scaler (`(x - mean) / scale`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerModelData {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Fixed affine transform fit during training
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        if mean.is_empty() || mean.len() != scale.len() {
            anyhow::bail!(
                "Scaler mean has {} entries and scale has {}",
                mean.len(),
                scale.len()
            );
        }
        if mean.iter().chain(&scale).any(|v| !v.is_finite()) {
            anyhow::bail!("Scaler parameters must be finite");
        }
        // Constant features were fit with a zero scale; treat them as unit scale
        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect::<Vec<_>>();

        Ok(Self {
            mean: Array1::from_vec(mean),
            scale: Array1::from_vec(scale),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let data: ScalerModelData =
            serde_json::from_str(json).context("Failed to parse scaler JSON")?;
        Self::new(data.mean, data.scale)
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, rows: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_width(rows.ncols())?;
        Ok((&rows - &self.mean) / &self.scale)
    }

    pub fn inverse_transform(&self, rows: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_width(rows.ncols())?;
        Ok(&rows * &self.scale + &self.mean)
    }

    fn check_width(&self, ncols: usize) -> Result<()> {
        if ncols != self.n_features() {
            anyhow::bail!(
                "Row has {} features, scaler expects {}",
                ncols,
                self.n_features()
            );
        }
        Ok(())
    }
}

/// Serialized k-means model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansModelData {
    #[serde(default)]
    pub n_clusters: Option<usize>,
    pub centroids: Vec<Vec<f64>>,
}

/// Nearest cluster and distances to every centroid for one row
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    pub cluster: usize,
    pub distances: Vec<f64>,
}

/// K-Means model paired with the scaler it was trained behind
#[derive(Debug, Clone)]
pub struct KMeansClusterer {
    centroids: Array2<f64>,
    scaler: StandardScaler,
    centroids_original: Array2<f64>,
}

impl KMeansClusterer {
    pub fn new(centroids: Array2<f64>, scaler: StandardScaler) -> Result<Self> {
        if centroids.nrows() == 0 {
            anyhow::bail!("K-Means model has no centroids");
        }
        if centroids.ncols() != scaler.n_features() {
            anyhow::bail!(
                "Centroids have {} features but scaler has {}",
                centroids.ncols(),
                scaler.n_features()
            );
        }
        if centroids.iter().any(|v| !v.is_finite()) {
            anyhow::bail!("Centroids must be finite");
        }
        let centroids_original = scaler.inverse_transform(centroids.view())?;

        Ok(Self {
            centroids,
            scaler,
            centroids_original,
        })
    }

    pub fn from_json(model_json: &str, scaler: StandardScaler) -> Result<Self> {
        let data: KMeansModelData =
            serde_json::from_str(model_json).context("Failed to parse K-Means JSON")?;

        let n = data.centroids.len();
        if let Some(expected) = data.n_clusters {
            if expected != n {
                anyhow::bail!("n_clusters is {} but {} centroids were given", expected, n);
            }
        }
        let dim = data.centroids.first().map(Vec::len).unwrap_or(0);
        let flat: Vec<f64> = data.centroids.into_iter().flatten().collect();
        let centroids = Array2::from_shape_vec((n, dim), flat)
            .context("Centroids must all have the same length")?;

        Self::new(centroids, scaler)
    }

    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.centroids.ncols()
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Centroids in scaled space, as fit
    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    /// Centroids mapped back to original feature units
    pub fn centroids_original(&self) -> &Array2<f64> {
        &self.centroids_original
    }

    /// Euclidean distance from each scaled row to every centroid
    pub fn transform(&self, rows: ArrayView2<f64>) -> Result<Array2<f64>> {
        let scaled = self.scaler.transform(rows)?;
        let mut distances = Array2::<f64>::zeros((scaled.nrows(), self.n_clusters()));

        for (row, mut out) in scaled.outer_iter().zip(distances.outer_iter_mut()) {
            for (centroid, d) in self.centroids.outer_iter().zip(out.iter_mut()) {
                *d = (&row - &centroid).mapv(|v| v * v).sum().sqrt();
            }
        }

        if distances.iter().any(|d| !d.is_finite()) {
            anyhow::bail!("Distance computation produced a non-finite value");
        }
        Ok(distances)
    }

    /// Nearest cluster per row; ties go to the lowest index
    pub fn predict(&self, rows: ArrayView2<f64>) -> Result<Vec<ClusterAssignment>> {
        let distances = self.transform(rows)?;
        Ok(distances
            .axis_iter(Axis(0))
            .map(|d| {
                let cluster = d
                    .iter()
                    .enumerate()
                    .fold((0, f64::INFINITY), |best, (i, &v)| {
                        if v < best.1 {
                            (i, v)
                        } else {
                            best
                        }
                    })
                    .0;
                ClusterAssignment {
                    cluster,
                    distances: d.to_vec(),
                }
            })
            .collect())
    }
}
