//! Feature normalization applied between the range gate and the classifier.
//!
//! Scaler artifacts are tagged by `kind`:
//!
//! ```json
//! {"kind": "standard", "features": [...], "mean": [...], "scale": [...]}
//! {"kind": "min_max", "features": [...], "data_min": [...], "data_max": [...]}
//! ```
//!
//! Arrays follow the order of `features` and are remapped to canonical
//! feature order when loaded.

use serde::Deserialize;
use std::path::Path;

use crate::artifacts::{read_json, FeatureColumns};
use crate::error::{Result, VitalsError};
use crate::types::{Feature, FeatureVector, FEATURE_COUNT};

const ARTIFACT: &str = "scaler";

/// Maps a raw reading into the space the classifier was trained in.
pub trait Transformer: Send + Sync {
    fn transform(&self, raw: &FeatureVector) -> Result<FeatureVector>;

    fn name(&self) -> &str;
}

/// `(x - mean) / scale`, per feature.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    pub fn new(mean: [f64; FEATURE_COUNT], scale: [f64; FEATURE_COUNT]) -> Result<Self> {
        for feature in Feature::ALL {
            let s = scale[feature.index()];
            if !s.is_finite() || s == 0.0 {
                return Err(VitalsError::model_load(
                    ARTIFACT,
                    format!("scale for {feature} must be finite and non-zero, got {s}"),
                ));
            }
            if !mean[feature.index()].is_finite() {
                return Err(VitalsError::model_load(
                    ARTIFACT,
                    format!("mean for {feature} must be finite"),
                ));
            }
        }
        Ok(Self { mean, scale })
    }
}

impl Transformer for StandardScaler {
    fn transform(&self, raw: &FeatureVector) -> Result<FeatureVector> {
        Ok(FeatureVector::from_fn(|f| {
            (raw.get(f) - self.mean[f.index()]) / self.scale[f.index()]
        }))
    }

    fn name(&self) -> &str {
        "standard"
    }
}

/// `(x - data_min) / (data_max - data_min)`, per feature. A zero-width
/// training range divides by one instead.
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxScaler {
    data_min: [f64; FEATURE_COUNT],
    span: [f64; FEATURE_COUNT],
}

impl MinMaxScaler {
    pub fn new(data_min: [f64; FEATURE_COUNT], data_max: [f64; FEATURE_COUNT]) -> Result<Self> {
        let mut span = [1.0; FEATURE_COUNT];
        for feature in Feature::ALL {
            let (lo, hi) = (data_min[feature.index()], data_max[feature.index()]);
            if !lo.is_finite() || !hi.is_finite() || hi < lo {
                return Err(VitalsError::model_load(
                    ARTIFACT,
                    format!("invalid min/max for {feature}: [{lo}, {hi}]"),
                ));
            }
            if hi > lo {
                span[feature.index()] = hi - lo;
            }
        }
        Ok(Self { data_min, span })
    }
}

impl Transformer for MinMaxScaler {
    fn transform(&self, raw: &FeatureVector) -> Result<FeatureVector> {
        Ok(FeatureVector::from_fn(|f| {
            (raw.get(f) - self.data_min[f.index()]) / self.span[f.index()]
        }))
    }

    fn name(&self) -> &str {
        "min_max"
    }
}

/// On-disk scaler artifact.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerParameters {
    Standard {
        features: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    },
    MinMax {
        features: Vec<String>,
        data_min: Vec<f64>,
        data_max: Vec<f64>,
    },
}

impl ScalerParameters {
    pub fn into_transformer(self) -> Result<Box<dyn Transformer>> {
        match self {
            ScalerParameters::Standard { features, mean, scale } => {
                let cols = FeatureColumns::from_names(ARTIFACT, &features)?;
                let mean = cols.to_canonical(ARTIFACT, "mean", &mean)?;
                let scale = cols.to_canonical(ARTIFACT, "scale", &scale)?;
                Ok(Box::new(StandardScaler::new(mean, scale)?))
            }
            ScalerParameters::MinMax { features, data_min, data_max } => {
                let cols = FeatureColumns::from_names(ARTIFACT, &features)?;
                let data_min = cols.to_canonical(ARTIFACT, "data_min", &data_min)?;
                let data_max = cols.to_canonical(ARTIFACT, "data_max", &data_max)?;
                Ok(Box::new(MinMaxScaler::new(data_min, data_max)?))
            }
        }
    }
}

pub fn load_scaler(path: &Path) -> Result<Box<dyn Transformer>> {
    read_json::<ScalerParameters>(ARTIFACT, path)?.into_transformer()
}
