//! Shared plumbing for the three startup artifacts produced by the offline
//! training job: file locations, JSON decoding and feature column mapping.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::error::{Result, VitalsError};
use crate::types::{Feature, FEATURE_COUNT};

pub const RANGES_FILE: &str = "healthy_ranges.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "model.json";

/// Locations of the range table, scaler and model artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub ranges: PathBuf,
    pub scaler: PathBuf,
    pub model: PathBuf,
}

impl ArtifactPaths {
    /// Conventional file names inside one directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            ranges: dir.join(RANGES_FILE),
            scaler: dir.join(SCALER_FILE),
            model: dir.join(MODEL_FILE),
        }
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(artifact: &str, path: &Path) -> Result<T> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        VitalsError::model_load(artifact, format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&json)
        .map_err(|e| VitalsError::model_load(artifact, format!("invalid JSON: {e}")))
}

/// Column layout of a trained artifact: which feature sits at each position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FeatureColumns {
    columns: [Feature; FEATURE_COUNT],
}

impl FeatureColumns {
    /// Requires exactly the six feature display names, each once, in any order.
    pub fn from_names(artifact: &str, names: &[String]) -> Result<Self> {
        if names.len() != FEATURE_COUNT {
            return Err(VitalsError::model_load(
                artifact,
                format!("expected {FEATURE_COUNT} feature names, got {}", names.len()),
            ));
        }
        let mut columns = [Feature::HeartRate; FEATURE_COUNT];
        let mut seen = [false; FEATURE_COUNT];
        for (pos, name) in names.iter().enumerate() {
            let feature = Feature::from_name(name).ok_or_else(|| {
                VitalsError::model_load(artifact, format!("unknown feature '{name}'"))
            })?;
            if seen[feature.index()] {
                return Err(VitalsError::model_load(
                    artifact,
                    format!("duplicate feature '{name}'"),
                ));
            }
            seen[feature.index()] = true;
            columns[pos] = feature;
        }
        Ok(Self { columns })
    }

    pub fn feature_at(&self, position: usize) -> Option<Feature> {
        self.columns.get(position).copied()
    }

    /// Reorder a per-column array into canonical feature order.
    pub fn to_canonical(&self, artifact: &str, field: &str, values: &[f64]) -> Result<[f64; FEATURE_COUNT]> {
        if values.len() != FEATURE_COUNT {
            return Err(VitalsError::model_load(
                artifact,
                format!("'{field}' has {} values, expected {FEATURE_COUNT}", values.len()),
            ));
        }
        let mut out = [0.0; FEATURE_COUNT];
        for (pos, value) in values.iter().enumerate() {
            if !value.is_finite() {
                return Err(VitalsError::model_load(
                    artifact,
                    format!("'{field}' contains a non-finite value"),
                ));
            }
            out[self.columns[pos].index()] = *value;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_in_dir_uses_conventional_names() {
        let paths = ArtifactPaths::in_dir("/srv/model");
        assert_eq!(paths.ranges, PathBuf::from("/srv/model/healthy_ranges.json"));
        assert_eq!(paths.scaler, PathBuf::from("/srv/model/scaler.json"));
        assert_eq!(paths.model, PathBuf::from("/srv/model/model.json"));
    }

    #[test]
    fn test_reorders_into_canonical_order() {
        let cols = FeatureColumns::from_names(
            "scaler",
            &names(&[
                "Respiration Rate",
                "Heart Rate",
                "Movement",
                "Oxygen Level",
                "Temperature",
                "Blood Pressure",
            ]),
        )
        .unwrap();
        assert_eq!(cols.feature_at(0), Some(Feature::RespirationRate));
        assert_eq!(cols.feature_at(6), None);

        let out = cols
            .to_canonical("scaler", "mean", &[16.0, 70.0, 5.0, 97.0, 36.6, 110.0])
            .unwrap();
        assert_eq!(out, [70.0, 5.0, 97.0, 36.6, 110.0, 16.0]);
    }

    #[test]
    fn test_rejects_duplicate_and_unknown_names() {
        let dup = names(&["Heart Rate", "Heart Rate", "Movement", "Oxygen Level", "Temperature", "Blood Pressure"]);
        assert!(FeatureColumns::from_names("model", &dup).is_err());

        let unknown = names(&["Pulse", "Movement", "Oxygen Level", "Temperature", "Blood Pressure", "Respiration Rate"]);
        let err = FeatureColumns::from_names("model", &unknown).unwrap_err();
        assert!(err.to_string().contains("Pulse"));
    }

    #[test]
    fn test_rejects_wrong_length() {
        let cols = FeatureColumns::from_names(
            "scaler",
            &Feature::ALL.iter().map(|f| f.name().to_string()).collect::<Vec<_>>(),
        )
        .unwrap();
        let err = cols.to_canonical("scaler", "scale", &[1.0, 2.0]).unwrap_err();
        assert!(err.to_string().contains("'scale' has 2 values"));
    }
}
