use serde::{
    ser::{SerializeMap, Serializer},
    Deserialize, Serialize,
};

use crate::horizon::Horizon;

/// Message attached to every successful result.
pub const SUCCESS_MESSAGE: &str = "Storm trajectory prediction completed!";

/// Predicted position at one horizon, already rounded for the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonPrediction {
    pub lat: f64,
    pub lon: f64,
    pub distance_from_current_km: f64,
}

/// Per-horizon predictions in horizon order. Serialises as a JSON object keyed
/// by `6H`/`12H`/`24H`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predictions(Vec<(Horizon, HorizonPrediction)>);

impl Predictions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, horizon: Horizon, prediction: HorizonPrediction) {
        self.0.push((horizon, prediction));
    }

    pub fn get(&self, horizon: Horizon) -> Option<&HorizonPrediction> {
        self.0.iter().find(|(h, _)| *h == horizon).map(|(_, p)| p)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Horizon, HorizonPrediction)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Predictions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (horizon, prediction) in &self.0 {
            map.serialize_entry(horizon.label(), prediction)?;
        }
        map.end()
    }
}

/// Outcome of one prediction request, in the envelope the HTTP boundary sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PredictionResult {
    Success {
        predictions: Predictions,
        message: String,
    },
    Error {
        message: String,
    },
}

impl PredictionResult {
    pub fn success(predictions: Predictions) -> Self {
        PredictionResult::Success {
            predictions,
            message: SUCCESS_MESSAGE.to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        PredictionResult::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PredictionResult::Success { .. })
    }

    pub fn predictions(&self) -> Option<&Predictions> {
        match self {
            PredictionResult::Success { predictions, .. } => Some(predictions),
            PredictionResult::Error { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            PredictionResult::Success { message, .. } | PredictionResult::Error { message } => {
                message
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_keeps_horizon_order() {
        let mut p = Predictions::new();
        for (i, h) in Horizon::ALL.into_iter().enumerate() {
            p.push(
                h,
                HorizonPrediction {
                    lat: 20.0 + i as f64,
                    lon: 120.0,
                    distance_from_current_km: 55.5,
                },
            );
        }
        let text = serde_json::to_string(&PredictionResult::success(p)).unwrap();

        let i6 = text.find("\"6H\"").unwrap();
        let i12 = text.find("\"12H\"").unwrap();
        let i24 = text.find("\"24H\"").unwrap();
        assert!(i6 < i12 && i12 < i24);

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["message"], SUCCESS_MESSAGE);
        assert_eq!(
            value["predictions"]["12H"],
            json!({ "lat": 21.0, "lon": 120.0, "distance_from_current_km": 55.5 })
        );
    }

    #[test]
    fn error_envelope_has_no_predictions() {
        let result = PredictionResult::error("boom");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value, json!({ "status": "error", "message": "boom" }));
        assert!(result.predictions().is_none());
        assert!(!result.is_success());
    }
}
