use std::sync::Arc;

use storm_predictor::{ModelBundle, Predictor};

pub const BUNDLE_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/storm_bundle.json");

pub fn load_bundle() -> ModelBundle {
    ModelBundle::load(BUNDLE_PATH).expect("fixture bundle should load")
}

pub fn predictor() -> Predictor {
    Predictor::new(Arc::new(load_bundle()))
}
