use std::time::Duration;

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Every argument problem found while decoding one invocation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{}", render_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violations: vec![FieldViolation {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.violations.iter().map(|violation| violation.field.as_str())
    }
}

fn render_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider response invalid: {0}")]
    Response(String),
    #[error("no response from {provider}")]
    EmptyResponse { provider: String },
    #[error("deadline exceeded after {after:?}, upstream call cancelled")]
    Timeout { after: Duration },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    MissingCredential(&'static str),
    #[error("failed to create {provider} client: {message}")]
    Client { provider: String, message: String },
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate capability registered: {0}")]
    DuplicateCapability(String),
    #[error("capability not found: {0}")]
    NotFound(String),
}
