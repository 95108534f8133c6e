use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::bundle::HorizonModels;
use crate::error::{ConfigError, ModelError, PipelineError, PredictionError};

/// Forecast offset from the observed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "6H")]
    H6,
    #[serde(rename = "12H")]
    H12,
    #[serde(rename = "24H")]
    H24,
}

impl Horizon {
    /// Every horizon, in response order.
    pub const ALL: [Horizon; 3] = [Horizon::H6, Horizon::H12, Horizon::H24];

    pub fn label(self) -> &'static str {
        match self {
            Horizon::H6 => "6H",
            Horizon::H12 => "12H",
            Horizon::H24 => "24H",
        }
    }

    pub fn hours(self) -> u32 {
        match self {
            Horizon::H6 => 6,
            Horizon::H12 => 12,
            Horizon::H24 => 24,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Horizon {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Horizon::ALL
            .into_iter()
            .find(|h| h.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownHorizon(s.to_string()))
    }
}

/// Which coordinate a model predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::Latitude => "latitude",
            Axis::Longitude => "longitude",
        })
    }
}

/// Predict `(lat, lon)` for one horizon from an aligned dense feature vector.
///
/// A horizon absent from either mapping is a configuration error; a model that
/// fails or returns a non-finite value is a prediction error tagged with the
/// horizon and axis.
pub fn predict_horizon(
    horizon: Horizon,
    features: &[f64],
    lat_models: &HorizonModels,
    lon_models: &HorizonModels,
) -> Result<(f64, f64), PipelineError> {
    let lat = predict_axis(horizon, Axis::Latitude, features, lat_models)?;
    let lon = predict_axis(horizon, Axis::Longitude, features, lon_models)?;
    Ok((lat, lon))
}

fn predict_axis(
    horizon: Horizon,
    axis: Axis,
    features: &[f64],
    models: &HorizonModels,
) -> Result<f64, PipelineError> {
    let model = models
        .get(&horizon)
        .ok_or(ConfigError::MissingModel { horizon, axis })?;

    let value = model
        .predict(features)
        .and_then(|v| {
            if v.is_finite() {
                Ok(v)
            } else {
                Err(ModelError::NonFiniteOutput(v))
            }
        })
        .map_err(|source| PredictionError::Model {
            horizon,
            axis,
            source,
        })?;
    Ok(value)
}
