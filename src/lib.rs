//! Vital sign classification: an inclusive range gate in front of an
//! offline-trained binary classifier.
//!
//! [`pipeline::PipelineContext`] holds the three trained artifacts (range
//! table, scaler, model) and is built once at startup. Classification is a
//! pure function of the context and a [`types::Reading`].

pub mod artifacts;
pub mod classifier;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod ranges;
pub mod scaler;
pub mod server;
pub mod types;

// Application layer shared by the HTTP server and the CLI
pub mod app;

pub use error::{Result, VitalsError};
pub use pipeline::{classify, PipelineContext};
pub use types::{Classification, Feature, Reading, UnhealthyReason};
