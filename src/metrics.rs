//! Prometheus metrics for classification outcomes.
//!
//! The recorder is installed once per process; `/metrics` renders through the
//! stored handle rather than a separate exporter listener.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

use crate::types::Classification;

pub const CLASSIFICATIONS_TOTAL: &str = "vitals_classifications_total";
pub const INVALID_INPUT_TOTAL: &str = "vitals_invalid_input_total";
pub const INTERNAL_ERRORS_TOTAL: &str = "vitals_internal_errors_total";
pub const CLASSIFICATION_DURATION: &str = "vitals_classification_duration_seconds";

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Idempotent; returns `None` if another
/// recorder was already installed by the host process.
pub fn init_metrics() -> Option<&'static PrometheusHandle> {
    INIT.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            ClassificationMetrics::register_metrics();
            info!("Prometheus recorder installed");
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    });
    HANDLE.get()
}

/// Prometheus text exposition, if the recorder is installed.
pub fn render() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}

pub struct ClassificationMetrics;

impl ClassificationMetrics {
    pub fn record_outcome(classification: &Classification, duration_secs: f64) {
        let (outcome, cause) = match classification {
            Classification::Healthy => ("healthy", "model_verdict"),
            Classification::Unhealthy(reason) => ("unhealthy", reason.cause()),
        };
        counter!(CLASSIFICATIONS_TOTAL, "outcome" => outcome, "cause" => cause).increment(1);
        histogram!(CLASSIFICATION_DURATION).record(duration_secs);
    }

    pub fn record_invalid_input(field: &str) {
        counter!(INVALID_INPUT_TOTAL, "field" => field.to_string()).increment(1);
    }

    pub fn record_internal_error() {
        counter!(INTERNAL_ERRORS_TOTAL).increment(1);
    }

    fn register_metrics() {
        describe_counter!(CLASSIFICATIONS_TOTAL, "Readings classified, by outcome and cause");
        describe_counter!(INVALID_INPUT_TOTAL, "Requests rejected for a missing or non-numeric field");
        describe_counter!(INTERNAL_ERRORS_TOTAL, "Normalization or inference failures");
        describe_histogram!(CLASSIFICATION_DURATION, "Time spent classifying one reading");

        // Pre-register so the series appear before first use
        let _ = counter!(INTERNAL_ERRORS_TOTAL);
        let _ = histogram!(CLASSIFICATION_DURATION);
    }
}
