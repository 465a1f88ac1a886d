//! Healthy range table and the inclusive range gate.
//!
//! The table artifact is a JSON object keyed by feature display name:
//!
//! ```json
//! { "Heart Rate": { "min": 60.0, "max": 100.0 }, "Movement": { "min": 0.0, "max": 10.0 } }
//! ```
//!
//! All six features are required. Unknown keys are ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Result, VitalsError};
use crate::types::{Feature, FeatureVector, FEATURE_COUNT};

const ARTIFACT: &str = "healthy ranges";

/// Inclusive `[min, max]` bound for one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthyRange {
    pub min: f64,
    pub max: f64,
}

impl HealthyRange {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(VitalsError::model_load(
                ARTIFACT,
                format!("bounds must be finite, got [{min}, {max}]"),
            ));
        }
        if min > max {
            return Err(VitalsError::model_load(
                ARTIFACT,
                format!("min {min} is greater than max {max}"),
            ));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// One [`HealthyRange`] per feature.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeTable {
    ranges: [HealthyRange; FEATURE_COUNT],
}

impl RangeTable {
    pub fn new(ranges: [HealthyRange; FEATURE_COUNT]) -> Result<Self> {
        for feature in Feature::ALL {
            let range = ranges[feature.index()];
            HealthyRange::new(range.min, range.max).map_err(|e| match e {
                VitalsError::ModelLoad { artifact, reason } => VitalsError::ModelLoad {
                    artifact,
                    reason: format!("{feature}: {reason}"),
                },
                other => other,
            })?;
        }
        Ok(Self { ranges })
    }

    pub fn get(&self, feature: Feature) -> HealthyRange {
        self.ranges[feature.index()]
    }

    /// First feature, in canonical order, whose value falls outside its range.
    pub fn first_violation(&self, values: &FeatureVector) -> Option<(Feature, f64)> {
        values
            .iter()
            .find(|(feature, value)| !self.get(*feature).contains(*value))
    }

    pub fn all_in_range(&self, values: &FeatureVector) -> bool {
        self.first_violation(values).is_none()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, HealthyRange> = serde_json::from_str(json)
            .map_err(|e| VitalsError::model_load(ARTIFACT, format!("invalid JSON: {e}")))?;

        let mut ranges = [HealthyRange { min: 0.0, max: 0.0 }; FEATURE_COUNT];
        for feature in Feature::ALL {
            let range = raw.get(feature.name()).ok_or_else(|| {
                VitalsError::model_load(ARTIFACT, format!("missing feature key '{feature}'"))
            })?;
            ranges[feature.index()] = *range;
        }
        Self::new(ranges)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            VitalsError::model_load(ARTIFACT, format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}
