//! Storm track prediction service.
//!
//! Given a storm's observed state, predicts its position 6, 12 and 24 hours
//! ahead with per-horizon latitude and longitude models, and reports how far
//! each predicted point is from the current one.

pub mod bundle;
pub mod config;
pub mod error;
pub mod features;
pub mod geo;
pub mod horizon;
pub mod model;
pub mod pipeline;
pub mod server;
pub mod types;

pub use bundle::{HorizonModels, ModelBundle};
pub use error::{ConfigError, ModelError, PipelineError, PredictionError};
pub use features::{align, AlignedFeatures, FeatureSchema, InputRecord};
pub use geo::haversine_km;
pub use horizon::{predict_horizon, Axis, Horizon};
pub use model::Regressor;
pub use pipeline::{assemble, Predictor};
pub use types::{HorizonPrediction, PredictionResult, Predictions};
