use thiserror::Error;

use crate::domain::DomainKey;

#[derive(Debug, Error)]
pub enum SimError {
    // Physical breakdown of the drop surface, not a numerical glitch.
    #[error("degenerate drop geometry: {0}")]
    GeometryDegenerate(String),

    #[error("domain operator mismatch: {0}")]
    OperatorMismatch(String),

    #[error("no cached domain operator for {0}")]
    OperatorNotFound(DomainKey),

    #[error("contact search did not converge after {iterations} solves (residual {residual:e}): {reason}")]
    ContactConvergence {
        iterations: usize,
        residual: f64,
        reason: String,
    },

    // Only escapes the integrator once all refinement levels are spent.
    #[error("step rejected at t={t}, dt={dt}: {reason}")]
    StepRejected { t: f64, dt: f64, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl SimError {
    pub fn kind(&self) -> &'static str {
        match self {
            SimError::GeometryDegenerate(_) => "GeometryDegenerateError",
            SimError::OperatorMismatch(_) => "OperatorMismatchError",
            SimError::OperatorNotFound(_) => "OperatorNotFoundError",
            SimError::ContactConvergence { .. } => "ContactConvergenceError",
            SimError::StepRejected { .. } => "StepRejected",
            SimError::InvalidConfiguration(_) => "InvalidConfiguration",
            SimError::Io(_) => "IoError",
            SimError::Yaml(_) => "YamlError",
            SimError::Json(_) => "JsonError",
            SimError::Csv(_) => "CsvError",
        }
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
