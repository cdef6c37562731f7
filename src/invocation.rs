use std::collections::HashMap;

use serde_json::Value;

use crate::error::{ConfigError, FieldViolation, ProviderError, ValidationError};
use crate::llm::InvocationResult;
use crate::tools::ParamSpec;

/// Typed arguments shared by the reasoning capabilities.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvocationRequest {
    pub question: String,
    pub context: String,
    pub knowledge: String,
    /// Whether `context` arrived as a string, as opposed to being absent,
    /// null, or of another type.
    pub context_supplied: bool,
}

impl InvocationRequest {
    pub fn new(
        question: impl Into<String>,
        context: impl Into<String>,
        knowledge: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            context: context.into(),
            knowledge: knowledge.into(),
            context_supplied: true,
        }
    }

    /// Decodes an untyped argument bag against a capability's parameters.
    ///
    /// Non-empty parameters must be present strings with content, and every
    /// such violation is collected before returning. Other parameters are
    /// lenient: absent, null, or non-string values decode to an empty string.
    pub fn from_arguments(
        params: &[ParamSpec],
        arguments: &Value,
    ) -> Result<Self, ValidationError> {
        let mut values = decode_arguments(params, arguments)?;
        let context_supplied = values.contains_key("context");

        Ok(Self {
            question: values.remove("question").unwrap_or_default(),
            context: values.remove("context").unwrap_or_default(),
            knowledge: values.remove("knowledge").unwrap_or_default(),
            context_supplied,
        })
    }
}

/// Returns only the parameters that were supplied as strings.
fn decode_arguments(
    params: &[ParamSpec],
    arguments: &Value,
) -> Result<HashMap<String, String>, ValidationError> {
    let empty = serde_json::Map::new();
    let args = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => {
            return Err(ValidationError::single(
                "arguments",
                "arguments must be a JSON object",
            ));
        }
    };

    let mut values = HashMap::new();
    let mut violations = Vec::new();

    for param in params {
        match args.get(param.name()) {
            Some(Value::String(text)) if !(param.is_non_empty() && text.is_empty()) => {
                values.insert(param.name().to_string(), text.clone());
            }
            _ if param.is_non_empty() => violations.push(violation(param)),
            _ => {}
        }
    }

    if violations.is_empty() {
        Ok(values)
    } else {
        Err(ValidationError { violations })
    }
}

fn violation(param: &ParamSpec) -> FieldViolation {
    FieldViolation {
        field: param.name().to_string(),
        message: format!("{} must be a non-empty {}", param.name(), param.kind()),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    Provider,
    EmptyResponse,
    Internal,
    Config,
}

/// Exactly one of a normalized answer or a categorized failure message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvocationOutcome {
    Success(InvocationResult),
    Failure { kind: FailureKind, message: String },
}

impl InvocationOutcome {
    pub fn invalid(err: &ValidationError) -> Self {
        Self::Failure {
            kind: FailureKind::Validation,
            message: format!("invalid request: {err}"),
        }
    }

    pub fn provider(err: &ProviderError) -> Self {
        match err {
            ProviderError::EmptyResponse { .. } => Self::Failure {
                kind: FailureKind::EmptyResponse,
                message: err.to_string(),
            },
            _ => Self::Failure {
                kind: FailureKind::Provider,
                message: format!("failed to generate content: {err}"),
            },
        }
    }

    pub fn config(err: &ConfigError) -> Self {
        Self::Failure {
            kind: FailureKind::Config,
            message: format!("provider unavailable: {err}"),
        }
    }

    pub fn internal(message: impl std::fmt::Display) -> Self {
        Self::Failure {
            kind: FailureKind::Internal,
            message: format!("internal error: {message}"),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}
