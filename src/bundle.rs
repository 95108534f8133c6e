//! The loaded model bundle: feature schema plus per-horizon latitude and
//! longitude models.
//!
//! A bundle is built once at startup, validated, and then only read. Share it
//! behind an `Arc`; nothing mutates it and there is no teardown beyond drop.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::Arc,
};

use crate::error::{ConfigError, PipelineError};
use crate::features::FeatureSchema;
use crate::horizon::{predict_horizon, Axis, Horizon};
use crate::model::{ModelSpec, Regressor};

pub type HorizonModels = HashMap<Horizon, Arc<dyn Regressor>>;

/// On-disk manifest layout.
#[derive(Debug, Deserialize)]
pub struct BundleManifest {
    pub features: Vec<String>,
    pub lat_models: HashMap<Horizon, ModelSpec>,
    pub lon_models: HashMap<Horizon, ModelSpec>,
}

pub struct ModelBundle {
    schema: FeatureSchema,
    lat_models: HorizonModels,
    lon_models: HorizonModels,
}

impl ModelBundle {
    /// Check that every horizon has both models and that each model's declared
    /// width matches the schema.
    pub fn new(
        schema: FeatureSchema,
        lat_models: HorizonModels,
        lon_models: HorizonModels,
    ) -> Result<Self, ConfigError> {
        for (axis, models) in [(Axis::Latitude, &lat_models), (Axis::Longitude, &lon_models)] {
            for horizon in Horizon::ALL {
                let model = models
                    .get(&horizon)
                    .ok_or(ConfigError::MissingModel { horizon, axis })?;
                if let Some(expected) = model.n_features() {
                    if expected != schema.len() {
                        return Err(ConfigError::FeatureCountMismatch {
                            horizon,
                            axis,
                            expected,
                            schema: schema.len(),
                        });
                    }
                }
            }
        }

        Ok(Self {
            schema,
            lat_models,
            lon_models,
        })
    }

    /// Load a JSON manifest. Artifact paths inside it resolve against the
    /// manifest's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let txt = fs::read_to_string(path)
            .with_context(|| format!("failed to read model bundle at {}", path.display()))?;
        let manifest: BundleManifest = serde_json::from_str(&txt)
            .with_context(|| format!("failed to parse model bundle {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_manifest(manifest, base_dir)
    }

    pub fn from_manifest(manifest: BundleManifest, base_dir: &Path) -> Result<Self> {
        let schema = FeatureSchema::new(manifest.features)?;
        let lat_models = build_models(manifest.lat_models, Axis::Latitude, base_dir)?;
        let lon_models = build_models(manifest.lon_models, Axis::Longitude, base_dir)?;
        Ok(Self::new(schema, lat_models, lon_models)?)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn lat_models(&self) -> &HorizonModels {
        &self.lat_models
    }

    pub fn lon_models(&self) -> &HorizonModels {
        &self.lon_models
    }

    /// Run every model once on an all-zero vector.
    pub fn warmup(&self) -> Result<(), PipelineError> {
        let zeros = vec![0.0; self.schema.len()];
        for horizon in Horizon::ALL {
            predict_horizon(horizon, &zeros, &self.lat_models, &self.lon_models)?;
        }
        Ok(())
    }
}

fn build_models(
    specs: HashMap<Horizon, ModelSpec>,
    axis: Axis,
    base_dir: &Path,
) -> Result<HorizonModels> {
    specs
        .into_iter()
        .map(|(horizon, spec)| {
            let model = spec
                .build(base_dir)
                .with_context(|| format!("failed to build {axis} model for horizon {horizon}"))?;
            Ok::<_, anyhow::Error>((horizon, model))
        })
        .collect()
}
