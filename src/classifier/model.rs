use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{FilmceptionError, Result};

fn default_threshold() -> f32 {
    0.5
}

/// Serialized multi-label genre model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreModelFile {
    /// Per-label probability cutoff. A label fires when its probability is
    /// strictly greater than the threshold.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(flatten)]
    pub estimator: EstimatorFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorFile {
    /// One-vs-rest logistic regression
    Linear {
        intercepts: Vec<f32>,
        /// One row of feature weights per label
        coefficients: Vec<Vec<f32>>,
    },
    /// One gradient-boosted tree ensemble per label
    BoostedTrees {
        n_features: usize,
        estimators: Vec<TreeEnsemble>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsemble {
    #[serde(default)]
    pub init_score: f32,
    pub trees: Vec<Tree>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    /// Node 0 is the root. Children always sit after their parent.
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        #[serde(default)]
        default_left: bool,
    },
    Leaf {
        value: f32,
    },
}

impl Tree {
    fn validate(&self, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(FilmceptionError::Load("Tree without nodes".to_string()));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split { feature, left, right, .. } = node {
                if *feature >= n_features {
                    return Err(FilmceptionError::Load(format!(
                        "Tree node {} splits on feature {} but the model has {} features",
                        index, feature, n_features
                    )));
                }
                for child in [*left, *right] {
                    if child <= index || child >= self.nodes.len() {
                        return Err(FilmceptionError::Load(format!(
                            "Tree node {} has invalid child {}",
                            index, child
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, features: &ArrayView1<f32>) -> f32 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split { feature, threshold, left, right, default_left } => {
                    let value = features[*feature];
                    index = if value.is_nan() {
                        if *default_left { *left } else { *right }
                    } else if value <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

enum Estimator {
    /// weights with shape (labels, features)
    Linear {
        weights: Array2<f32>,
        intercepts: Array1<f32>,
    },
    Trees {
        n_features: usize,
        ensembles: Vec<TreeEnsemble>,
    },
}

pub struct GenreModel {
    threshold: f32,
    estimator: Estimator,
}

impl GenreModel {
    pub fn new(file: GenreModelFile) -> Result<Self> {
        if !(0.0..1.0).contains(&file.threshold) {
            return Err(FilmceptionError::Load(format!(
                "Decision threshold {} is outside [0, 1)",
                file.threshold
            )));
        }

        let estimator = match file.estimator {
            EstimatorFile::Linear { intercepts, coefficients } => {
                let n_labels = coefficients.len();
                if n_labels == 0 || intercepts.len() != n_labels {
                    return Err(FilmceptionError::Load(format!(
                        "Linear model has {} coefficient rows and {} intercepts",
                        n_labels,
                        intercepts.len()
                    )));
                }
                let n_features = coefficients[0].len();
                if coefficients.iter().any(|row| row.len() != n_features) {
                    return Err(FilmceptionError::Load(
                        "Linear model coefficient rows differ in length".to_string(),
                    ));
                }
                let flat: Vec<f32> = coefficients.into_iter().flatten().collect();
                let weights = Array2::from_shape_vec((n_labels, n_features), flat)
                    .map_err(|e| FilmceptionError::Load(format!("Invalid coefficient matrix: {}", e)))?;
                Estimator::Linear {
                    weights,
                    intercepts: Array1::from(intercepts),
                }
            }
            EstimatorFile::BoostedTrees { n_features, estimators } => {
                if estimators.is_empty() {
                    return Err(FilmceptionError::Load(
                        "Boosted tree model has no per-label estimators".to_string(),
                    ));
                }
                for ensemble in &estimators {
                    for tree in &ensemble.trees {
                        tree.validate(n_features)?;
                    }
                }
                Estimator::Trees {
                    n_features,
                    ensembles: estimators,
                }
            }
        };

        Ok(Self { threshold: file.threshold, estimator })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Expected feature vector length
    pub fn n_features(&self) -> usize {
        match &self.estimator {
            Estimator::Linear { weights, .. } => weights.ncols(),
            Estimator::Trees { n_features, .. } => *n_features,
        }
    }

    /// Number of labels the model scores
    pub fn n_labels(&self) -> usize {
        match &self.estimator {
            Estimator::Linear { weights, .. } => weights.nrows(),
            Estimator::Trees { ensembles, .. } => ensembles.len(),
        }
    }

    /// Independent per-label probabilities
    pub fn probabilities(&self, features: &ArrayView1<f32>) -> Array1<f32> {
        match &self.estimator {
            Estimator::Linear { weights, intercepts } => {
                let mut scores = weights.dot(features) + intercepts;
                scores.mapv_inplace(sigmoid);
                scores
            }
            Estimator::Trees { ensembles, .. } => ensembles
                .iter()
                .map(|ensemble| {
                    let raw = ensemble.init_score
                        + ensemble.trees.iter().map(|t| t.evaluate(features)).sum::<f32>();
                    sigmoid(raw)
                })
                .collect(),
        }
    }

    /// Per-label binary indicators
    pub fn predict(&self, features: &ArrayView1<f32>) -> Vec<bool> {
        self.probabilities(features)
            .iter()
            .map(|p| *p > self.threshold)
            .collect()
    }
}

fn sigmoid(x: f32) -> f32 {
    1. / (1. + (-x).exp())
}
