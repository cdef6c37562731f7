mod cache;
mod deepseek;
mod gemini;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::invocation::InvocationRequest;

pub use cache::{ProviderCache, ProviderFactory};
pub use deepseek::{DeepseekModel, DeepseekModelConfig};
pub use gemini::{ContextMode, GeminiModel, GeminiModelConfig};

/// One upstream reference attached to a generated answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Source {
    pub label: String,
    pub uri: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvocationResult {
    pub text: String,
    pub sources: Vec<Source>,
}

impl InvocationResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

/// Translates an [`InvocationRequest`] into one provider's native call and
/// its native response back into an [`InvocationResult`].
#[async_trait]
pub trait ReasoningModel: Send + Sync {
    /// Human-facing provider name, used in empty-response failures.
    fn provider(&self) -> &str;

    async fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResult, ProviderError>;
}
