use thiserror::Error;

use crate::horizon::{Axis, Horizon};

/// Problems with the loaded model bundle or the process configuration.
///
/// These are not request-scoped: a bundle that produces one of these at load
/// time must not be served.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("feature schema is empty")]
    EmptySchema,
    #[error("duplicate feature `{0}` in schema")]
    DuplicateFeature(String),
    #[error("no {axis} model for horizon {horizon}")]
    MissingModel { horizon: Horizon, axis: Axis },
    #[error("{axis} model for horizon {horizon} expects {expected} features, schema has {schema}")]
    FeatureCountMismatch {
        horizon: Horizon,
        axis: Axis,
        expected: usize,
        schema: usize,
    },
    #[error("unknown horizon `{0}`")]
    UnknownHorizon(String),
    #[error("{0} not set")]
    MissingEnv(&'static str),
    #[error("{name} is invalid: {reason}")]
    InvalidEnv { name: &'static str, reason: String },
}

/// Failure inside a single regressor call.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("feature length mismatch: got {got}, expected {expected}")]
    FeatureLength { got: usize, expected: usize },
    #[error("input contains NaN or infinity at feature index {index}")]
    NonFiniteInput { index: usize },
    #[error("model produced a non-finite value ({0})")]
    NonFiniteOutput(f64),
    #[error("malformed model: {0}")]
    Malformed(String),
    #[error("{0}")]
    Backend(String),
}

/// Request-scoped failure while turning one input record into predictions.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("feature `{feature}` is not numeric: {value}")]
    NonNumericFeature { feature: String, value: String },
    #[error("current position {field} is not a finite number: {value}")]
    InvalidPosition { field: &'static str, value: String },
    #[error("{axis} model failed for horizon {horizon}: {source}")]
    Model {
        horizon: Horizon,
        axis: Axis,
        #[source]
        source: ModelError,
    },
}

/// Everything the prediction pipeline can fail with.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error(transparent)]
    Prediction(#[from] PredictionError),
}

impl PipelineError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, PipelineError::Configuration(_))
    }
}
