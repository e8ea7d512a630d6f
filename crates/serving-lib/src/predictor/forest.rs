//! Random forest classifier loaded from a JSON export
//!
//! Each tree is a flat node array. Split nodes send a row left when
//! `x[feature] <= threshold`; leaf nodes carry per-class weights which are
//! normalized per leaf. The forest probability is the mean over trees.

use super::ClassScores;
use anyhow::{Context, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// One node of an exported decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

/// Serialized forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModelData {
    pub n_features: usize,
    pub classes: Vec<i64>,
    pub trees: Vec<DecisionTree>,
}

/// Validated, normalized random forest
#[derive(Debug, Clone)]
pub struct RandomForestClassifier {
    n_features: usize,
    classes: Vec<i64>,
    trees: Vec<DecisionTree>,
}

impl RandomForestClassifier {
    pub fn from_json(json: &str) -> Result<Self> {
        let data: ForestModelData =
            serde_json::from_str(json).context("Failed to parse random forest JSON")?;
        Self::from_data(data)
    }

    pub fn from_data(data: ForestModelData) -> Result<Self> {
        if data.trees.is_empty() {
            anyhow::bail!("Random forest has no trees");
        }
        if data.classes.len() < 2 {
            anyhow::bail!("Random forest needs at least 2 classes, got {}", data.classes.len());
        }

        let n_classes = data.classes.len();
        let mut trees = Vec::with_capacity(data.trees.len());
        for (t, tree) in data.trees.into_iter().enumerate() {
            trees.push(
                normalize_tree(tree, data.n_features, n_classes)
                    .with_context(|| format!("Invalid tree {}", t))?,
            );
        }

        Ok(Self {
            n_features: data.n_features,
            classes: data.classes,
            trees,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Class probabilities for each row, shape `[rows, n_classes]`
    pub fn predict_proba(&self, rows: ArrayView2<f64>) -> Result<Array2<f64>> {
        if rows.ncols() != self.n_features {
            anyhow::bail!(
                "Row has {} features, forest expects {}",
                rows.ncols(),
                self.n_features
            );
        }

        let n_classes = self.classes.len();
        let mut proba = Array2::<f64>::zeros((rows.nrows(), n_classes));
        for (row, mut out) in rows.outer_iter().zip(proba.outer_iter_mut()) {
            for tree in &self.trees {
                let leaf = descend(tree, row)?;
                for (acc, v) in out.iter_mut().zip(leaf) {
                    *acc += v;
                }
            }
            out.mapv_inplace(|v| v / self.trees.len() as f64);
        }
        Ok(proba)
    }

    /// Predicted class index and probabilities for each row
    pub fn predict(&self, rows: ArrayView2<f64>) -> Result<Vec<ClassScores>> {
        let proba = self.predict_proba(rows)?;
        Ok(proba
            .outer_iter()
            .map(|p| ClassScores::from_probabilities(p.to_vec()))
            .collect())
    }
}

fn normalize_tree(tree: DecisionTree, n_features: usize, n_classes: usize) -> Result<DecisionTree> {
    if tree.nodes.is_empty() {
        anyhow::bail!("tree has no nodes");
    }
    let n_nodes = tree.nodes.len();

    let nodes = tree
        .nodes
        .into_iter()
        .enumerate()
        .map(|(i, node)| match node {
            TreeNode::Split {
                feature,
                left,
                right,
                ..
            } if feature >= n_features || left >= n_nodes || right >= n_nodes => {
                Err(anyhow::anyhow!(
                    "node {} references feature {} / children {}, {}",
                    i,
                    feature,
                    left,
                    right
                ))
            }
            TreeNode::Leaf { value } => {
                if value.len() != n_classes {
                    anyhow::bail!("leaf {} has {} values, expected {}", i, value.len(), n_classes);
                }
                if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    anyhow::bail!("leaf {} has negative or non-finite weights", i);
                }
                let total: f64 = value.iter().sum();
                let value = if total > 0.0 {
                    value.iter().map(|v| v / total).collect()
                } else {
                    vec![1.0 / n_classes as f64; n_classes]
                };
                Ok(TreeNode::Leaf { value })
            }
            split => Ok(split),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DecisionTree { nodes })
}

fn descend<'a>(tree: &'a DecisionTree, row: ArrayView1<f64>) -> Result<&'a [f64]> {
    let mut idx = 0;
    // A well-formed tree reaches a leaf in fewer steps than it has nodes
    for _ in 0..tree.nodes.len() {
        match &tree.nodes[idx] {
            TreeNode::Leaf { value } => return Ok(value),
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                idx = if row[*feature] <= *threshold { *left } else { *right };
            }
        }
    }
    anyhow::bail!("Tree traversal did not reach a leaf (cycle in node links)")
}
