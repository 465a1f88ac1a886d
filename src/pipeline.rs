//! The decision pipeline: parse → range gate → normalize → infer.
//!
//! Any out-of-range feature short-circuits to `Unhealthy` without touching
//! the transformer or the scorer. Normalization and inference failures are
//! reported as [`VitalsError::Internal`], never as a verdict.

use tracing::info;

use crate::artifacts::ArtifactPaths;
use crate::classifier::{load_model, Scorer};
use crate::error::{Result, VitalsError};
use crate::ranges::RangeTable;
use crate::scaler::{load_scaler, Transformer};
use crate::types::{Classification, FieldMap, Reading, UnhealthyReason, HEALTHY_LABEL};

/// The three trained artifacts, loaded once at startup and read-only after.
pub struct PipelineContext {
    ranges: RangeTable,
    transformer: Box<dyn Transformer>,
    scorer: Box<dyn Scorer>,
}

impl PipelineContext {
    pub fn new(ranges: RangeTable, transformer: Box<dyn Transformer>, scorer: Box<dyn Scorer>) -> Self {
        Self {
            ranges,
            transformer,
            scorer,
        }
    }

    /// Load all three artifacts. Any failure is a fatal `ModelLoad`.
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let ranges = RangeTable::load(&paths.ranges)?;
        info!(path = %paths.ranges.display(), "Loaded healthy range table");

        let transformer = load_scaler(&paths.scaler)?;
        info!(path = %paths.scaler.display(), kind = transformer.name(), "Loaded feature scaler");

        let scorer = load_model(&paths.model)?;
        info!(path = %paths.model.display(), kind = scorer.name(), "Loaded classifier model");

        Ok(Self::new(ranges, transformer, scorer))
    }

    pub fn ranges(&self) -> &RangeTable {
        &self.ranges
    }

    pub fn transformer_name(&self) -> &str {
        self.transformer.name()
    }

    pub fn scorer_name(&self) -> &str {
        self.scorer.name()
    }

    pub fn classify(&self, reading: &Reading) -> Result<Classification> {
        classify(self, reading)
    }

    pub fn classify_fields(&self, fields: &FieldMap) -> Result<Classification> {
        let reading = Reading::parse(fields)?;
        classify(self, &reading)
    }
}

pub fn classify(ctx: &PipelineContext, reading: &Reading) -> Result<Classification> {
    if let Some((feature, value)) = ctx.ranges.first_violation(reading.values()) {
        return Ok(Classification::Unhealthy(UnhealthyReason::OutOfRange {
            feature,
            value,
        }));
    }

    let normalized = ctx.transformer.transform(reading.values())?;
    if !normalized.is_finite() {
        return Err(VitalsError::Internal(format!(
            "{} scaler produced a non-finite feature vector",
            ctx.transformer.name()
        )));
    }

    let label = ctx.scorer.predict(&normalized)?;
    if label == HEALTHY_LABEL {
        Ok(Classification::Healthy)
    } else {
        Ok(Classification::Unhealthy(UnhealthyReason::ModelVerdict { label }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranges::HealthyRange;
    use crate::types::{Feature, FeatureVector, Label};

    struct Identity;

    impl Transformer for Identity {
        fn transform(&self, raw: &FeatureVector) -> Result<FeatureVector> {
            Ok(*raw)
        }

        fn name(&self) -> &str {
            "identity"
        }
    }

    struct Broken;

    impl Transformer for Broken {
        fn transform(&self, _raw: &FeatureVector) -> Result<FeatureVector> {
            Ok(FeatureVector::new([f64::NAN; 6]))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    struct Fixed(Label);

    impl Scorer for Fixed {
        fn predict(&self, _normalized: &FeatureVector) -> Result<Label> {
            Ok(self.0)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct Failing;

    impl Scorer for Failing {
        fn predict(&self, _normalized: &FeatureVector) -> Result<Label> {
            Err(VitalsError::Internal("model crashed".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn ranges() -> RangeTable {
        RangeTable::new([HealthyRange { min: 0.0, max: 1.0 }; 6]).unwrap()
    }

    fn mid() -> Reading {
        Reading::new([0.5; 6]).unwrap()
    }

    #[test]
    fn test_label_one_is_healthy() {
        let ctx = PipelineContext::new(ranges(), Box::new(Identity), Box::new(Fixed(1)));
        assert_eq!(ctx.classify(&mid()).unwrap(), Classification::Healthy);
    }

    #[test]
    fn test_other_labels_are_unhealthy() {
        for label in [0, 2, -1] {
            let ctx = PipelineContext::new(ranges(), Box::new(Identity), Box::new(Fixed(label)));
            assert_eq!(
                ctx.classify(&mid()).unwrap(),
                Classification::Unhealthy(UnhealthyReason::ModelVerdict { label })
            );
        }
    }

    #[test]
    fn test_out_of_range_skips_broken_stages() {
        // A broken transformer and failing scorer are never reached.
        let ctx = PipelineContext::new(ranges(), Box::new(Broken), Box::new(Failing));
        let reading = Reading::new([0.5, 0.5, 0.5, 0.5, 0.5, 1.5]).unwrap();
        assert_eq!(
            ctx.classify(&reading).unwrap(),
            Classification::Unhealthy(UnhealthyReason::OutOfRange {
                feature: Feature::RespirationRate,
                value: 1.5
            })
        );
    }

    #[test]
    fn test_non_finite_normalization_is_internal() {
        let ctx = PipelineContext::new(ranges(), Box::new(Broken), Box::new(Fixed(1)));
        assert!(matches!(ctx.classify(&mid()), Err(VitalsError::Internal(_))));
    }

    #[test]
    fn test_scorer_failure_is_not_a_verdict() {
        let ctx = PipelineContext::new(ranges(), Box::new(Identity), Box::new(Failing));
        let err = ctx.classify(&mid()).unwrap_err();
        assert!(matches!(err, VitalsError::Internal(ref m) if m == "model crashed"));
    }

    #[test]
    fn test_classify_fields_parses_first() {
        let ctx = PipelineContext::new(ranges(), Box::new(Identity), Box::new(Failing));
        let err = ctx.classify_fields(&FieldMap::new()).unwrap_err();
        assert_eq!(err.invalid_field(), Some("Heart Rate"));
    }
}
