//! Reasoning tools backed by upstream AI providers.
//!
//! - `deepseek_reasoning`: chat-completion adapter (system context + user question)
//! - `gemini_thinking`: generative-content adapter with citation and grounding sources
//! - Schema-driven argument validation, a deadline-bound executor and a panic guard
//! - Enable list (`ENABLE_TOOLS`) applied at registration

pub mod config;
pub mod error;
pub mod executor;
pub mod invocation;
pub mod llm;
pub mod tools;

pub use config::{Settings, ToolFilter};
pub use error::{ConfigError, FieldViolation, ProviderError, RegistryError, ValidationError};
pub use executor::{DEFAULT_TIMEOUT, Executor};
pub use invocation::{FailureKind, InvocationOutcome, InvocationRequest};
pub use llm::{
    ContextMode, DeepseekModel, DeepseekModelConfig, GeminiModel, GeminiModelConfig,
    InvocationResult, ProviderCache, ReasoningModel, Source,
};
pub use tools::{CallToolResult, ParamSpec, ToolRegistry, ToolSpec};
