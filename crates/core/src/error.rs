use thiserror::Error;

use crate::validation::ValidationIssue;

pub type AttributionResult<T> = Result<T, AttributionError>;

#[derive(Error, Debug)]
pub enum AttributionError {
    #[error("Input validation failed with {} issue(s): {}", .0.len(), summarize(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Result cache error: {0}")]
    Cache(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AttributionError {
    /// The individual problems behind a validation failure, empty otherwise.
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            AttributionError::Validation(issues) => issues,
            _ => &[],
        }
    }
}

impl From<config::ConfigError> for AttributionError {
    fn from(err: config::ConfigError) -> Self {
        AttributionError::Config(err.to_string())
    }
}

fn summarize(issues: &[ValidationIssue]) -> String {
    const SHOWN: usize = 5;
    let mut parts: Vec<String> = issues.iter().take(SHOWN).map(|i| i.to_string()).collect();
    if issues.len() > SHOWN {
        parts.push(format!("and {} more", issues.len() - SHOWN));
    }
    parts.join("; ")
}
