use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{Result, VitalsError};
use crate::metrics::ClassificationMetrics;
use crate::pipeline::PipelineContext;
use crate::types::{Classification, FieldMap, Reading};

/// Classifies raw request fields against the loaded pipeline context and
/// records the outcome. Shared by the HTTP handlers and the CLI.
#[derive(Clone)]
pub struct ClassifyUseCase {
    context: Arc<PipelineContext>,
}

impl ClassifyUseCase {
    pub fn new(context: Arc<PipelineContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn classify_fields(&self, fields: &FieldMap) -> Result<Classification> {
        let started = Instant::now();

        let reading = match Reading::parse(fields) {
            Ok(reading) => reading,
            Err(e) => {
                if let Some(field) = e.invalid_field() {
                    ClassificationMetrics::record_invalid_input(field);
                }
                warn!(error = %e, "Rejected reading");
                return Err(e);
            }
        };

        self.classify_reading(&reading, started)
    }

    pub fn classify(&self, reading: &Reading) -> Result<Classification> {
        self.classify_reading(reading, Instant::now())
    }

    fn classify_reading(&self, reading: &Reading, started: Instant) -> Result<Classification> {
        debug!(?reading, "Classifying reading");
        match self.context.classify(reading) {
            Ok(classification) => {
                ClassificationMetrics::record_outcome(&classification, started.elapsed().as_secs_f64());
                match classification.reason() {
                    None => info!(result = classification.message(), "Reading classified"),
                    Some(reason) => info!(
                        result = classification.message(),
                        cause = reason.cause(),
                        ?reason,
                        "Reading classified"
                    ),
                }
                Ok(classification)
            }
            Err(e) => {
                if matches!(e, VitalsError::Internal(_)) {
                    ClassificationMetrics::record_internal_error();
                }
                error!(error = %e, "Classification failed");
                Err(e)
            }
        }
    }
}
