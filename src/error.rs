use thiserror::Error;

#[derive(Error, Debug)]
pub enum VitalsError {
    /// A startup artifact (range table, scaler, model) is absent or malformed.
    #[error("Failed to load {artifact}: {reason}")]
    ModelLoad { artifact: String, reason: String },

    /// A request field is missing (`value == None`) or not a finite number.
    #[error("{}", invalid_input_message(.field, .value.as_deref()))]
    InvalidInput {
        field: String,
        value: Option<String>,
    },

    /// Normalization or inference failed. Never reported as a verdict.
    #[error("Internal classification error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

fn invalid_input_message(field: &str, value: Option<&str>) -> String {
    match value {
        None => format!("Missing required field: {field}"),
        Some(raw) => format!("Invalid value for {field}: {raw:?} is not a finite number"),
    }
}

impl VitalsError {
    pub fn model_load(artifact: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        VitalsError::ModelLoad {
            artifact: artifact.into(),
            reason: reason.to_string(),
        }
    }

    /// Field named by an `InvalidInput` error, if this is one.
    pub fn invalid_field(&self) -> Option<&str> {
        match self {
            VitalsError::InvalidInput { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, VitalsError>;
