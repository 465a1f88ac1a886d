use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

use crate::error::{Result, VitalsError};

/// Number of vital-sign features every reading, range table and model covers.
pub const FEATURE_COUNT: usize = 6;

/// Label the classifier emits for a healthy subject.
pub const HEALTHY_LABEL: Label = 1;

pub const HEALTHY_MESSAGE: &str = "Healthy";
pub const ADVISORY: &str = "Please consult a doctor.";
pub const UNHEALTHY_MESSAGE: &str = "Unhealthy. Please consult a doctor.";

/// Class label produced by a [`crate::classifier::Scorer`].
pub type Label = i64;

/// Raw request fields keyed by display name or form key.
pub type FieldMap = HashMap<String, String>;

/// The six vital-sign features, in the column order the model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    #[serde(rename = "Heart Rate")]
    HeartRate,
    #[serde(rename = "Movement")]
    Movement,
    #[serde(rename = "Oxygen Level")]
    OxygenLevel,
    #[serde(rename = "Temperature")]
    Temperature,
    #[serde(rename = "Blood Pressure")]
    BloodPressure,
    #[serde(rename = "Respiration Rate")]
    RespirationRate,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::HeartRate,
        Feature::Movement,
        Feature::OxygenLevel,
        Feature::Temperature,
        Feature::BloodPressure,
        Feature::RespirationRate,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Display name, as used for artifact keys and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Feature::HeartRate => "Heart Rate",
            Feature::Movement => "Movement",
            Feature::OxygenLevel => "Oxygen Level",
            Feature::Temperature => "Temperature",
            Feature::BloodPressure => "Blood Pressure",
            Feature::RespirationRate => "Respiration Rate",
        }
    }

    /// HTML form field name.
    pub fn form_key(self) -> &'static str {
        match self {
            Feature::HeartRate => "heart_rate",
            Feature::Movement => "movement",
            Feature::OxygenLevel => "oxygen_level",
            Feature::Temperature => "temperature",
            Feature::BloodPressure => "blood_pressure",
            Feature::RespirationRate => "respiration_rate",
        }
    }

    /// Case-sensitive lookup by display name.
    pub fn from_name(name: &str) -> Option<Feature> {
        Feature::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Six `f64` values in canonical [`Feature`] order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    /// Build a vector by evaluating `f` once per feature, in canonical order.
    pub fn from_fn(mut f: impl FnMut(Feature) -> f64) -> Self {
        let mut values = [0.0; FEATURE_COUNT];
        for feature in Feature::ALL {
            values[feature.index()] = f(feature);
        }
        Self(values)
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.into_iter().map(move |f| (f, self.0[f.index()]))
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl Index<Feature> for FeatureVector {
    type Output = f64;

    fn index(&self, feature: Feature) -> &f64 {
        &self.0[feature.index()]
    }
}

/// One subject's vitals. Every value is finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    values: FeatureVector,
}

impl Reading {
    /// Build a reading from already-numeric values, rejecting NaN and infinities.
    pub fn new(values: [f64; FEATURE_COUNT]) -> Result<Self> {
        for feature in Feature::ALL {
            let value = values[feature.index()];
            if !value.is_finite() {
                return Err(VitalsError::InvalidInput {
                    field: feature.name().to_string(),
                    value: Some(value.to_string()),
                });
            }
        }
        Ok(Self {
            values: FeatureVector::new(values),
        })
    }

    /// Parse raw request fields. Each feature is looked up by display name,
    /// then by form key; the first missing or non-numeric field in canonical
    /// order is reported.
    pub fn parse(fields: &FieldMap) -> Result<Self> {
        let mut values = [0.0; FEATURE_COUNT];
        for feature in Feature::ALL {
            let raw = fields
                .get(feature.name())
                .or_else(|| fields.get(feature.form_key()))
                .ok_or_else(|| VitalsError::InvalidInput {
                    field: feature.name().to_string(),
                    value: None,
                })?;
            values[feature.index()] = parse_value(feature, raw)?;
        }
        Ok(Self {
            values: FeatureVector::new(values),
        })
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values.get(feature)
    }

    pub fn values(&self) -> &FeatureVector {
        &self.values
    }
}

fn parse_value(feature: Feature, raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(VitalsError::InvalidInput {
            field: feature.name().to_string(),
            value: Some(raw.to_string()),
        }),
    }
}

/// Why a subject was classified unhealthy. Both causes render the same
/// message; the distinction is kept for callers and metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum UnhealthyReason {
    /// First feature, in canonical order, outside its healthy range.
    OutOfRange { feature: Feature, value: f64 },
    /// All features in range but the classifier returned a non-healthy label.
    ModelVerdict { label: Label },
}

impl UnhealthyReason {
    pub fn cause(&self) -> &'static str {
        match self {
            UnhealthyReason::OutOfRange { .. } => "out_of_range",
            UnhealthyReason::ModelVerdict { .. } => "model_verdict",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Classification {
    Healthy,
    Unhealthy(UnhealthyReason),
}

impl Classification {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Classification::Healthy)
    }

    /// The user-facing result string.
    pub fn message(&self) -> &'static str {
        match self {
            Classification::Healthy => HEALTHY_MESSAGE,
            Classification::Unhealthy(_) => UNHEALTHY_MESSAGE,
        }
    }

    pub fn reason(&self) -> Option<&UnhealthyReason> {
        match self {
            Classification::Healthy => None,
            Classification::Unhealthy(reason) => Some(reason),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
