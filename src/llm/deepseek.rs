use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, ProviderError};
use crate::invocation::InvocationRequest;
use crate::llm::{InvocationResult, ReasoningModel};

const DEFAULT_API_BASE_URL: &str = "https://api.deepseek.com";
const DEFAULT_MODEL: &str = "deepseek-reasoner";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const PROVIDER_NAME: &str = "Deepseek";

#[derive(Debug, Clone)]
pub struct DeepseekModelConfig {
    pub api_key: String,
    pub model: String,
    pub api_base_url: Option<String>,
    pub temperature: f32,
}

impl DeepseekModelConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: None,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Chat-completion adapter: a system message carrying the context and a
/// user message carrying the question.
#[derive(Debug, Clone)]
pub struct DeepseekModel {
    client: Client,
    config: DeepseekModelConfig,
}

impl DeepseekModel {
    pub fn new(config: DeepseekModelConfig) -> Result<Self, ConfigError> {
        let client = Client::builder().build().map_err(|err| ConfigError::Client {
            provider: PROVIDER_NAME.to_string(),
            message: err.to_string(),
        })?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/');
        format!("{base}/chat/completions")
    }
}

#[async_trait]
impl ReasoningModel for DeepseekModel {
    fn provider(&self) -> &str {
        PROVIDER_NAME
    }

    async fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResult, ProviderError> {
        let payload = build_request(request, &self.config);
        debug!(model = %payload.model, endpoint = %self.endpoint(), "sending chat completion");

        let response = self
            .client
            .post(self.endpoint())
            .header("authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Request(extract_api_error(response).await));
        }

        let payload = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|err| ProviderError::Response(err.to_string()))?;

        normalize_response(payload)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatRequestMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
enum ChatRequestMessage {
    System { content: String },
    User { content: String },
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatAssistantMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatAssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatErrorEnvelope {
    error: ChatApiError,
}

#[derive(Debug, Deserialize)]
struct ChatApiError {
    message: Option<String>,
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<Value>,
}

fn build_request(
    request: &InvocationRequest,
    config: &DeepseekModelConfig,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: build_messages(request),
        temperature: config.temperature,
        stream: false,
    }
}

fn build_messages(request: &InvocationRequest) -> Vec<ChatRequestMessage> {
    let mut system = String::from("Context:\n");
    system.push_str(&request.context);

    if !request.knowledge.is_empty() {
        system.push_str("\n\nAdditional Context:\n");
        system.push_str(&request.knowledge);
    }

    vec![
        ChatRequestMessage::System { content: system },
        ChatRequestMessage::User {
            content: request.question.clone(),
        },
    ]
}

fn normalize_response(
    response: ChatCompletionResponse,
) -> Result<InvocationResult, ProviderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::EmptyResponse {
            provider: PROVIDER_NAME.to_string(),
        })?;

    let text = choice
        .message
        .and_then(|message| message.content)
        .unwrap_or_default();

    Ok(InvocationResult::text(text))
}

async fn extract_api_error(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if let Ok(parsed) = serde_json::from_str::<ChatErrorEnvelope>(&body) {
        let code = parsed
            .error
            .code
            .map(|value| match value {
                Value::String(value) => value,
                other => other.to_string(),
            })
            .unwrap_or_else(|| status.as_u16().to_string());
        let error_type = parsed
            .error
            .type_
            .unwrap_or_else(|| status.to_string().to_uppercase());
        let message = parsed
            .error
            .message
            .unwrap_or_else(|| "unknown deepseek api error".to_string());

        return format!("deepseek api error {code} {error_type}: {message}");
    }

    if body.is_empty() {
        format!("deepseek api request failed ({status})")
    } else {
        format!("deepseek api request failed ({status}): {body}")
    }
}
