//! Feature schema and sparse-to-dense alignment of input records.

use serde_json::{Map, Value};
use std::{collections::HashSet, fmt};

use crate::error::{ConfigError, PredictionError};

/// Value used for every schema feature the input does not provide.
pub const MISSING_FILL: f64 = 0.0;

/// Ordered feature names the models were trained on. Fixed once the bundle is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Result<Self, ConfigError> {
        if names.is_empty() {
            return Err(ConfigError::EmptySchema);
        }
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateFeature(name.clone()));
            }
        }
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// One request's observed state: feature name to (loosely typed) value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputRecord(Map<String, Value>);

impl InputRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Current-position coordinate: absent means [`MISSING_FILL`], otherwise the
    /// value must be a JSON number. Strings, booleans and `null` are rejected
    /// here even though the feature vector coerces them.
    pub fn coordinate(&self, field: &'static str) -> Result<f64, PredictionError> {
        let Some(value) = self.0.get(field) else {
            return Ok(MISSING_FILL);
        };
        match value.as_f64() {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(PredictionError::InvalidPosition {
                field,
                value: value.to_string(),
            }),
        }
    }
}

impl From<Map<String, Value>> for InputRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for InputRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One position of an aligned vector.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureSlot {
    Number(f64),
    /// Anything that was not a JSON number; coerced (or rejected) in [`AlignedFeatures::to_dense`].
    Raw(Value),
}

/// Input reshaped onto the schema: same length, same order, missing filled.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFeatures {
    slots: Vec<FeatureSlot>,
}

/// Align `input` onto `schema`. Never fails: missing features become
/// [`MISSING_FILL`], features outside the schema are dropped.
pub fn align(input: &InputRecord, schema: &FeatureSchema) -> AlignedFeatures {
    let mut slots = Vec::with_capacity(schema.len());
    for name in schema.names() {
        let slot = match input.get(name) {
            None => FeatureSlot::Number(MISSING_FILL),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) => FeatureSlot::Number(v),
                None => FeatureSlot::Raw(Value::Number(n.clone())),
            },
            Some(other) => FeatureSlot::Raw(other.clone()),
        };
        slots.push(slot);
    }
    AlignedFeatures { slots }
}

impl AlignedFeatures {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[FeatureSlot] {
        &self.slots
    }

    /// Materialise the fixed-size numeric buffer fed to every model.
    ///
    /// `null` becomes NaN (left for the model's imputer), booleans 1/0, numeric
    /// strings are parsed. Any other value names its feature in the error.
    pub fn to_dense(&self, schema: &FeatureSchema) -> Result<Vec<f64>, PredictionError> {
        self.slots
            .iter()
            .zip(schema.names())
            .map(|(slot, name)| match slot {
                FeatureSlot::Number(v) => Ok(*v),
                FeatureSlot::Raw(value) => {
                    coerce_numeric(value).ok_or_else(|| PredictionError::NonNumericFeature {
                        feature: name.clone(),
                        value: value.to_string(),
                    })
                }
            })
            .collect()
    }
}

/// Numeric view of a JSON value, as an array conversion to float would see it.
pub fn coerce_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Null => Some(f64::NAN),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Shape statistics of a dense vector, for request logging.
pub struct FeatureSummary<'a> {
    values: &'a [f64],
    names: &'a [String],
}

impl<'a> FeatureSummary<'a> {
    pub fn new(values: &'a [f64], schema: &'a FeatureSchema) -> Self {
        Self {
            values,
            names: schema.names(),
        }
    }
}

impl fmt::Display for FeatureSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.values;
        let nz = v.iter().filter(|x| **x != 0.0).count();
        let mean = if v.is_empty() {
            0.0
        } else {
            v.iter().sum::<f64>() / v.len() as f64
        };
        let std = if v.len() < 2 {
            0.0
        } else {
            (v.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / v.len() as f64).sqrt()
        };
        let sample: Vec<String> = self
            .names
            .iter()
            .zip(v)
            .take(6)
            .map(|(name, x)| format!("{name}={x:.3}"))
            .collect();
        write!(
            f,
            "in_dim={} nonzero={} mean={:.3} std={:.3} sample=[{}]",
            v.len(),
            nz,
            mean,
            std,
            sample.join(", ")
        )
    }
}
