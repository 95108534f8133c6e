//! Request-scoped prediction: align once, predict every horizon, attach the
//! distance moved, round for the wire.
//!
//! Horizons are evaluated in order and the first failure aborts the request,
//! so a result carries either all three horizons or none.

use std::sync::Arc;

use crate::bundle::{HorizonModels, ModelBundle};
use crate::error::PipelineError;
use crate::features::{align, FeatureSchema, FeatureSummary, InputRecord};
use crate::geo::haversine_km;
use crate::horizon::{predict_horizon, Horizon};
use crate::types::{HorizonPrediction, PredictionResult, Predictions};

pub const COORD_DECIMALS: usize = 4;
pub const DISTANCE_DECIMALS: usize = 2;

/// Round to `decimals` places on the exact binary value, ties to even.
///
/// `76.125` is exactly representable and becomes `76.12`; `20.12345` is stored
/// slightly below its literal and becomes `20.1234`.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{value:.decimals$}").parse().unwrap_or(value)
}

/// Predict every horizon for `input`, converting any failure into an error
/// result. Never panics on bad input and never returns a partial result.
pub fn assemble(
    input: &InputRecord,
    schema: &FeatureSchema,
    lat_models: &HorizonModels,
    lon_models: &HorizonModels,
) -> PredictionResult {
    match try_assemble(input, schema, lat_models, lon_models) {
        Ok(predictions) => PredictionResult::success(predictions),
        Err(err) => {
            if err.is_configuration() {
                tracing::error!("model bundle is inconsistent: {err}");
            } else {
                tracing::warn!("prediction failed: {err}");
            }
            PredictionResult::error(err.to_string())
        }
    }
}

pub fn try_assemble(
    input: &InputRecord,
    schema: &FeatureSchema,
    lat_models: &HorizonModels,
    lon_models: &HorizonModels,
) -> Result<Predictions, PipelineError> {
    let current_lat = input.coordinate("LAT")?;
    let current_lon = input.coordinate("LON")?;

    let aligned = align(input, schema);
    let features = aligned.to_dense(schema)?;
    tracing::debug!("features {}", FeatureSummary::new(&features, schema));

    let mut predictions = Predictions::new();
    for horizon in Horizon::ALL {
        let (lat, lon) = predict_horizon(horizon, &features, lat_models, lon_models)?;
        let distance = haversine_km(current_lat, current_lon, lat, lon);
        predictions.push(
            horizon,
            HorizonPrediction {
                lat: round_to(lat, COORD_DECIMALS),
                lon: round_to(lon, COORD_DECIMALS),
                distance_from_current_km: round_to(distance, DISTANCE_DECIMALS),
            },
        );
    }
    Ok(predictions)
}

/// Entry point bound to one loaded bundle. Cheap to clone and safe to share
/// across request tasks.
#[derive(Clone)]
pub struct Predictor {
    bundle: Arc<ModelBundle>,
}

impl Predictor {
    pub fn new(bundle: Arc<ModelBundle>) -> Self {
        Self { bundle }
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn predict(&self, input: &InputRecord) -> PredictionResult {
        assemble(
            input,
            self.bundle.schema(),
            self.bundle.lat_models(),
            self.bundle.lon_models(),
        )
    }

    pub fn try_predict(&self, input: &InputRecord) -> Result<Predictions, PipelineError> {
        try_assemble(
            input,
            self.bundle.schema(),
            self.bundle.lat_models(),
            self.bundle.lon_models(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ModelError, PredictionError};
    use crate::model::{LinearModel, Regressor};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records the vectors it sees and returns their sum.
    #[derive(Default)]
    struct Recording {
        calls: AtomicUsize,
        seen: std::sync::Mutex<Vec<Vec<f64>>>,
    }

    impl Regressor for Recording {
        fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(features.to_vec());
            Ok(features.iter().sum())
        }
    }

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec!["LAT".into(), "LON".into(), "WS".into()]).unwrap()
    }

    fn shared(model: Arc<dyn Regressor>) -> HorizonModels {
        Horizon::ALL.into_iter().map(|h| (h, model.clone())).collect()
    }

    #[test]
    fn rounding_contract() {
        assert_eq!(round_to(20.123456, 4), 20.1235);
        assert_eq!(round_to(-15.55555, 2), -15.56);
        assert_eq!(round_to(76.125, 2), 76.12);
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
        assert_eq!(round_to(0.0, 2), 0.0);
        assert!(round_to(f64::NAN, 2).is_nan());
    }

    #[test]
    fn every_horizon_sees_the_same_vector() {
        let rec = Arc::new(Recording::default());
        let models = shared(rec.clone());
        let input: InputRecord = [("LAT", json!(10.0)), ("WS", json!(30.0))].into_iter().collect();

        let result = assemble(&input, &schema(), &models, &models);
        assert!(result.is_success());
        assert_eq!(rec.calls.load(Ordering::SeqCst), 6);
        let seen = rec.seen.lock().unwrap();
        assert!(seen.iter().all(|v| v == &vec![10.0, 0.0, 30.0]));
    }

    #[test]
    fn output_is_rounded() {
        let lat = shared(Arc::new(LinearModel::new(0.123456789, vec![1.0, 0.0, 0.0])));
        let lon = shared(Arc::new(LinearModel::new(0.987654321, vec![0.0, 1.0, 0.0])));
        let input: InputRecord = [("LAT", 20.0), ("LON", 120.0)].into_iter().collect();

        let predictions = try_assemble(&input, &schema(), &lat, &lon).unwrap();
        let p = predictions.get(Horizon::H6).unwrap();
        assert_eq!(p.lat, 20.1235);
        assert_eq!(p.lon, 120.9877);
        assert_eq!(p.distance_from_current_km, round_to(p.distance_from_current_km, 2));
        assert!(p.distance_from_current_km > 0.0);
    }

    #[test]
    fn first_failure_aborts_the_request() {
        let good = shared(Arc::new(LinearModel::new(0.0, vec![1.0, 0.0, 0.0])));
        let bad = shared(Arc::new(LinearModel::new(0.0, vec![1.0, 0.0])));
        let input = InputRecord::new();

        let err = try_assemble(&input, &schema(), &good, &bad).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Prediction(PredictionError::Model {
                horizon: Horizon::H6,
                ..
            })
        ));

        let result = assemble(&input, &schema(), &good, &bad);
        assert!(result.predictions().is_none());
        assert!(result.message().contains("longitude model failed for horizon 6H"));
    }

    #[test]
    fn missing_model_surfaces_as_configuration_error() {
        let lat = shared(Arc::new(LinearModel::new(0.0, vec![1.0, 0.0, 0.0])));
        let mut lon = lat.clone();
        lon.remove(&Horizon::H24);

        let err = try_assemble(&InputRecord::new(), &schema(), &lat, &lon).unwrap_err();
        assert!(err.is_configuration());

        let result = assemble(&InputRecord::new(), &schema(), &lat, &lon);
        assert!(result.message().starts_with("configuration error"));
    }

    #[test]
    fn non_finite_position_is_an_error_not_a_panic() {
        let models = shared(Arc::new(LinearModel::new(0.0, vec![1.0, 0.0, 0.0])));
        let input: InputRecord = [("LAT", json!("north"))].into_iter().collect();

        let result = assemble(&input, &schema(), &models, &models);
        assert!(!result.is_success());
        assert!(result.message().contains("LAT"));
    }
}
