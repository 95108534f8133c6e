//! Per-axis regression models.
//!
//! Every backend implements [`Regressor`]: one dense feature vector in, one
//! coordinate out. Backends are described in the bundle manifest by
//! [`ModelSpec`] and turned into shared trait objects by [`ModelSpec::build`].

use anyhow::Result;
use serde::Deserialize;
use std::{path::Path, sync::Arc};

use crate::error::ModelError;

/// Capability shared by every model backend.
pub trait Regressor: Send + Sync {
    /// Predict a single scalar from a feature vector in schema order.
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError>;

    /// Number of features the model was trained on, when the backend knows it.
    fn n_features(&self) -> Option<usize> {
        None
    }
}

fn check_len(features: &[f64], expected: usize) -> Result<(), ModelError> {
    if features.len() != expected {
        return Err(ModelError::FeatureLength {
            got: features.len(),
            expected,
        });
    }
    Ok(())
}

// ---------- Linear ----------

/// `intercept + coefficients · x`
#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            intercept,
            coefficients,
        }
    }
}

impl Regressor for LinearModel {
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        check_len(features, self.coefficients.len())?;
        if let Some(index) = features.iter().position(|x| !x.is_finite()) {
            return Err(ModelError::NonFiniteInput { index });
        }
        let dot: f64 = self
            .coefficients
            .iter()
            .zip(features)
            .map(|(c, x)| c * x)
            .sum();
        Ok(self.intercept + dot)
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }
}

// ---------- Tree ensemble ----------

/// One node of a flattened regression tree. Node 0 is the root.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Go `left` when `x[feature] <= threshold`, else `right`. NaN follows
    /// `missing_left`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default = "default_missing_left")]
        missing_left: bool,
    },
    Leaf {
        value: f64,
    },
}

fn default_missing_left() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Malformed("tree has no nodes".into()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= n_features {
                    return Err(ModelError::Malformed(format!(
                        "node {i} splits on feature {feature}, model has {n_features}"
                    )));
                }
                if *left >= self.nodes.len() || *right >= self.nodes.len() {
                    return Err(ModelError::Malformed(format!(
                        "node {i} points outside the tree ({} nodes)",
                        self.nodes.len()
                    )));
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, features: &[f64]) -> Result<f64, ModelError> {
        let mut idx = 0;
        // a well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..self.nodes.len() {
            let node = self.nodes.get(idx).ok_or_else(|| {
                ModelError::Malformed(format!(
                    "node index {idx} outside the tree ({} nodes)",
                    self.nodes.len()
                ))
            })?;
            match node {
                TreeNode::Leaf { value } => return Ok(*value),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    missing_left,
                } => {
                    let x = *features.get(*feature).ok_or_else(|| {
                        ModelError::Malformed(format!(
                            "split on feature {feature}, input has {}",
                            features.len()
                        ))
                    })?;
                    let go_left = if x.is_nan() {
                        *missing_left
                    } else {
                        x <= *threshold
                    };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
        Err(ModelError::Malformed("tree contains a cycle".into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Average of tree outputs (random forest).
    Mean,
    /// `learning_rate` times the sum of tree outputs (gradient boosting).
    Sum,
}

/// Forest or boosted ensemble of regression trees, offset by `base_score`.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEnsemble {
    pub n_features: usize,
    pub trees: Vec<Tree>,
    pub aggregation: Aggregation,
    #[serde(default)]
    pub base_score: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

fn default_learning_rate() -> f64 {
    1.0
}

impl TreeEnsemble {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Malformed("ensemble has no trees".into()));
        }
        self.trees
            .iter()
            .try_for_each(|tree| tree.validate(self.n_features))
    }
}

impl Regressor for TreeEnsemble {
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        check_len(features, self.n_features)?;
        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.evaluate(features)?;
        }
        let combined = match self.aggregation {
            Aggregation::Mean => total / self.trees.len() as f64,
            Aggregation::Sum => self.learning_rate * total,
        };
        Ok(self.base_score + combined)
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }
}

// ---------- Preprocessing pipeline ----------

/// Replaces NaN with the per-feature median seen at training time.
#[derive(Debug, Clone, Deserialize)]
pub struct MedianImputer {
    pub statistics: Vec<f64>,
}

/// `(x - mean) / scale`; a zero scale leaves the centred value unscaled.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Imputation and scaling in front of an inner estimator.
pub struct PipelineModel {
    imputer: Option<MedianImputer>,
    scaler: Option<StandardScaler>,
    estimator: Arc<dyn Regressor>,
    n_features: usize,
}

impl PipelineModel {
    pub fn new(
        imputer: Option<MedianImputer>,
        scaler: Option<StandardScaler>,
        estimator: Arc<dyn Regressor>,
    ) -> Result<Self, ModelError> {
        let mut widths = Vec::new();
        if let Some(imp) = &imputer {
            widths.push(("imputer", imp.statistics.len()));
        }
        if let Some(sc) = &scaler {
            if sc.mean.len() != sc.scale.len() {
                return Err(ModelError::Malformed(format!(
                    "scaler has {} means and {} scales",
                    sc.mean.len(),
                    sc.scale.len()
                )));
            }
            widths.push(("scaler", sc.mean.len()));
        }
        if let Some(n) = estimator.n_features() {
            widths.push(("estimator", n));
        }

        let Some(&(_, n_features)) = widths.first() else {
            return Err(ModelError::Malformed(
                "pipeline width is unknown: add an imputer, a scaler, or a sized estimator".into(),
            ));
        };
        if let Some((stage, n)) = widths.iter().find(|(_, n)| *n != n_features) {
            return Err(ModelError::Malformed(format!(
                "pipeline {stage} expects {n} features, first stage expects {n_features}"
            )));
        }

        Ok(Self {
            imputer,
            scaler,
            estimator,
            n_features,
        })
    }
}

impl Regressor for PipelineModel {
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        check_len(features, self.n_features)?;
        let mut x = features.to_vec();

        if let Some(imp) = &self.imputer {
            for (v, median) in x.iter_mut().zip(&imp.statistics) {
                if v.is_nan() {
                    *v = *median;
                }
            }
        }
        if let Some(sc) = &self.scaler {
            for ((v, mean), scale) in x.iter_mut().zip(&sc.mean).zip(&sc.scale) {
                let s = if *scale == 0.0 { 1.0 } else { *scale };
                *v = (*v - mean) / s;
            }
        }

        self.estimator.predict(&x)
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }
}

// ---------- TorchScript ----------

#[cfg(feature = "torch")]
pub use torch::TorchScriptModel;

#[cfg(feature = "torch")]
mod torch {
    use anyhow::{bail, Context, Result};
    use std::path::Path;
    use tch::{kind::Kind, CModule, Device, Tensor};

    use super::Regressor;
    use crate::error::ModelError;

    /// TorchScript regressor mapping `[1, n_features]` to a single value.
    pub struct TorchScriptModel {
        module: CModule,
        device: Device,
        n_features: usize,
    }

    impl TorchScriptModel {
        pub fn load(path: &Path, n_features: usize) -> Result<Self> {
            let device = Device::Cpu;
            let module = CModule::load_on_device(path, device)
                .with_context(|| format!("failed to load TorchScript {}", path.display()))?;

            // Probe output shape with a dummy forward; expect one value
            let dummy = Tensor::zeros([1, n_features as i64], (Kind::Float, device));
            let out = module.forward_ts(&[dummy])?;
            if out.numel() != 1 {
                bail!(
                    "TorchScript {} returned {:?}, expected a single value",
                    path.display(),
                    out.size()
                );
            }

            Ok(Self {
                module,
                device,
                n_features,
            })
        }
    }

    impl Regressor for TorchScriptModel {
        fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
            super::check_len(features, self.n_features)?;
            let x: Vec<f32> = features.iter().map(|v| *v as f32).collect();
            let input = Tensor::from_slice(&x)
                .reshape([1, self.n_features as i64])
                .to_device(self.device);

            let out = self
                .module
                .forward_ts(&[input])
                .map_err(|e| ModelError::Backend(e.to_string()))?;
            if out.numel() != 1 {
                return Err(ModelError::Backend(format!(
                    "unexpected output shape {:?}",
                    out.size()
                )));
            }
            Ok(out.reshape([-1]).double_value(&[0]))
        }

        fn n_features(&self) -> Option<usize> {
            Some(self.n_features)
        }
    }
}

// ---------- Manifest description ----------

/// Serialized description of a model, as it appears in the bundle manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
    Pipeline {
        #[serde(default)]
        imputer: Option<MedianImputer>,
        #[serde(default)]
        scaler: Option<StandardScaler>,
        estimator: Box<ModelSpec>,
    },
    Torchscript {
        path: String,
        n_features: usize,
    },
}

impl ModelSpec {
    /// Build the runtime model. Relative artifact paths resolve against `base_dir`.
    pub fn build(self, base_dir: &Path) -> Result<Arc<dyn Regressor>> {
        let model: Arc<dyn Regressor> = match self {
            ModelSpec::Linear(m) => Arc::new(m),
            ModelSpec::TreeEnsemble(m) => {
                m.validate()?;
                Arc::new(m)
            }
            ModelSpec::Pipeline {
                imputer,
                scaler,
                estimator,
            } => {
                let inner = estimator.build(base_dir)?;
                Arc::new(PipelineModel::new(imputer, scaler, inner)?)
            }
            ModelSpec::Torchscript { path, n_features } => {
                build_torchscript(&base_dir.join(path), n_features)?
            }
        };
        Ok(model)
    }
}

#[cfg(feature = "torch")]
fn build_torchscript(path: &Path, n_features: usize) -> Result<Arc<dyn Regressor>> {
    Ok(Arc::new(TorchScriptModel::load(path, n_features)?))
}

#[cfg(not(feature = "torch"))]
fn build_torchscript(path: &Path, _n_features: usize) -> Result<Arc<dyn Regressor>> {
    anyhow::bail!(
        "{} is a TorchScript model; rebuild with `--features torch`",
        path.display()
    )
}
