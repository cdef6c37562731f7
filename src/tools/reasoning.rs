use std::sync::Arc;

use tracing::warn;

use crate::config::{DEEPSEEK_API_KEY, GOOGLE_AI_API_KEY, Settings};
use crate::error::{ConfigError, RegistryError};
use crate::executor::Executor;
use crate::llm::{
    DeepseekModel, DeepseekModelConfig, GeminiModel, GeminiModelConfig, ProviderCache,
    ReasoningModel,
};
use crate::tools::{ParamSpec, ToolRegistry, ToolSpec};

pub const DEEPSEEK_REASONING: &str = "deepseek_reasoning";
pub const GEMINI_THINKING: &str = "gemini_thinking";

const DEEPSEEK_GATE: &str = "deepseek";
const GEMINI_GATE: &str = "gemini";

pub fn deepseek_reasoning_tool(provider: Arc<ProviderCache>, executor: Executor) -> ToolSpec {
    ToolSpec::new(
        DEEPSEEK_REASONING,
        "advanced reasoning engine using Deepseek's AI capabilities for multi-step problem solving, critical analysis, and strategic decision support",
    )
    .with_gate_key(DEEPSEEK_GATE)
    .with_param(
        ParamSpec::string(
            "question",
            "The structured query or problem statement requiring deep analysis and reasoning",
        )
        .non_empty(),
    )
    .with_param(
        ParamSpec::string(
            "context",
            "Defines the operational context and purpose of the query within the MCP ecosystem",
        )
        .required(),
    )
    .with_param(ParamSpec::string(
        "knowledge",
        "Provides relevant chat history, knowledge base entries, and structured data context for MCP-aware reasoning",
    ))
    .with_handler(move |request| {
        let provider = provider.clone();
        async move { executor.execute(&provider, &request).await }
    })
}

pub fn gemini_thinking_tool(provider: Arc<ProviderCache>, executor: Executor) -> ToolSpec {
    ToolSpec::new(
        GEMINI_THINKING,
        "Use Gemini to think about a question. Gemini will provide a detailed answer to the question.",
    )
    .with_gate_key(GEMINI_GATE)
    .with_param(
        ParamSpec::string("question", "The question to ask. Should be a question").non_empty(),
    )
    .with_param(
        ParamSpec::string(
            "context",
            "Context/purpose of the question, helps Gemini to understand the question better",
        )
        .required(),
    )
    .with_handler(move |request| {
        let provider = provider.clone();
        async move { executor.execute(&provider, &request).await }
    })
}

/// Provider handles built from `settings`. Each is constructed on first use.
pub fn provider_caches(settings: &Settings) -> (Arc<ProviderCache>, Arc<ProviderCache>) {
    let deepseek_key = settings.deepseek_api_key.clone();
    let deepseek_base_url = settings.deepseek_base_url.clone();
    let deepseek = ProviderCache::new("Deepseek", move || {
        let api_key = deepseek_key
            .clone()
            .ok_or(ConfigError::MissingCredential(DEEPSEEK_API_KEY))?;
        let mut config = DeepseekModelConfig::new(api_key);
        config.api_base_url = deepseek_base_url.clone();
        Ok(Arc::new(DeepseekModel::new(config)?) as Arc<dyn ReasoningModel>)
    });

    let google_key = settings.google_api_key.clone();
    let gemini_base_url = settings.gemini_base_url.clone();
    let context_mode = settings.context_mode;
    let gemini = ProviderCache::new("Gemini", move || {
        let api_key = google_key
            .clone()
            .ok_or(ConfigError::MissingCredential(GOOGLE_AI_API_KEY))?;
        let mut config = GeminiModelConfig::new(api_key);
        config.api_base_url = gemini_base_url.clone();
        config.context_mode = context_mode;
        Ok(Arc::new(GeminiModel::new(config)?) as Arc<dyn ReasoningModel>)
    });

    (Arc::new(deepseek), Arc::new(gemini))
}

pub fn all_tools(settings: &Settings) -> Vec<ToolSpec> {
    let executor = Executor::new(settings.timeout);
    let (deepseek, gemini) = provider_caches(settings);

    vec![
        deepseek_reasoning_tool(deepseek, executor),
        gemini_thinking_tool(gemini, executor),
    ]
}

/// Registers every enabled capability. Enabled capabilities whose provider
/// credential is absent are still registered and fail per invocation.
pub fn build_registry(settings: &Settings) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new(settings.tool_filter.clone());

    for tool in all_tools(settings) {
        let missing_credential = match tool.gate_key() {
            DEEPSEEK_GATE if settings.deepseek_api_key.is_none() => Some(DEEPSEEK_API_KEY),
            GEMINI_GATE if settings.google_api_key.is_none() => Some(GOOGLE_AI_API_KEY),
            _ => None,
        };
        let name = tool.name().to_string();

        if registry.register(tool)?
            && let Some(variable) = missing_credential
        {
            warn!(tool = %name, "{variable} is not set; invocations will fail");
        }
    }

    Ok(registry)
}
