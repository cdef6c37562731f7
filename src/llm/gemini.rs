use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ProviderError};
use crate::invocation::InvocationRequest;
use crate::llm::{InvocationResult, ReasoningModel, Source};

const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash-thinking-exp-01-21";
const PROVIDER_NAME: &str = "Gemini";
const SYSTEM_PREAMBLE: &str = "You are a thinking assistant. You will think about the question and provide a detailed answer to the question.";

/// Decides when the request context is appended to the system instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContextMode {
    /// Append whenever the context is non-empty.
    #[default]
    Intended,
    /// Append only when the context was absent or not a string, matching the
    /// historical behavior of this tool. An explicit `""` does not append.
    Literal,
}

impl FromStr for ContextMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "intended" => Ok(Self::Intended),
            "literal" => Ok(Self::Literal),
            other => Err(format!(
                "unknown context mode '{other}' (expected 'intended' or 'literal')"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiModelConfig {
    pub api_key: String,
    pub model: String,
    pub api_base_url: Option<String>,
    pub context_mode: ContextMode,
}

impl GeminiModelConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: None,
            context_mode: ContextMode::default(),
        }
    }
}

/// Generative-content adapter. Answers carry citation and grounding
/// metadata, which is flattened into the result text.
#[derive(Debug, Clone)]
pub struct GeminiModel {
    client: Client,
    config: GeminiModelConfig,
}

impl GeminiModel {
    pub fn new(config: GeminiModelConfig) -> Result<Self, ConfigError> {
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
        format!("{base}/models/{}:generateContent", self.config.model)
    }
}

#[async_trait]
impl ReasoningModel for GeminiModel {
    fn provider(&self) -> &str {
        PROVIDER_NAME
    }

    async fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResult, ProviderError> {
        let payload = build_request(request, self.config.context_mode);
        debug!(model = %self.config.model, "sending generateContent");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Request(extract_api_error(response).await));
        }

        let payload = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|err| ProviderError::Response(err.to_string()))?;

        normalize_response(payload)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
    system_instruction: GeminiContent,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    citation_metadata: Option<CitationMetadata>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CitationMetadata {
    #[serde(default, alias = "citationSources")]
    citations: Vec<Citation>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Citation {
    #[serde(default)]
    uri: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GroundingChunk {
    retrieved_context: Option<RetrievedContext>,
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RetrievedContext {
    #[serde(default)]
    text: String,
    #[serde(default)]
    uri: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WebChunk {
    #[serde(default)]
    title: String,
    #[serde(default)]
    uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiErrorEnvelope {
    error: GeminiApiError,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiApiError {
    code: Option<u16>,
    status: Option<String>,
    message: Option<String>,
}

fn build_request(request: &InvocationRequest, mode: ContextMode) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart {
                text: Some(request.question.clone()),
            }],
        }],
        system_instruction: GeminiContent {
            role: Some("system".to_string()),
            parts: vec![GeminiPart {
                text: Some(system_instruction(request, mode)),
            }],
        },
    }
}

fn system_instruction(request: &InvocationRequest, mode: ContextMode) -> String {
    let append = match mode {
        ContextMode::Intended => !request.context.is_empty(),
        ContextMode::Literal => !request.context_supplied,
    };

    let mut instruction = String::from(SYSTEM_PREAMBLE);
    if append {
        instruction.push_str("\n\nContext: ");
        instruction.push_str(&request.context);
    }
    instruction
}

fn normalize_response(
    response: GenerateContentResponse,
) -> Result<InvocationResult, ProviderError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(ProviderError::EmptyResponse {
            provider: PROVIDER_NAME.to_string(),
        });
    };

    let mut text = String::new();
    let mut sources = Vec::new();

    if let Some(content) = candidate.content {
        for part in content.parts {
            if let Some(part_text) = part.text {
                text.push_str(&part_text);
            }
        }
    }

    if let Some(citation_metadata) = candidate.citation_metadata {
        for citation in citation_metadata.citations {
            text.push_str("\n\nSource: ");
            text.push_str(&citation.uri);
            sources.push(Source {
                label: String::new(),
                uri: citation.uri,
            });
        }
    }

    // The header is emitted even when the metadata carries no chunks.
    if let Some(grounding_metadata) = candidate.grounding_metadata {
        text.push_str("\n\nSources: ");
        for chunk in grounding_metadata.grounding_chunks {
            if let Some(retrieved) = chunk.retrieved_context {
                push_source_line(&mut text, &mut sources, retrieved.text, retrieved.uri);
            }
            if let Some(web) = chunk.web {
                push_source_line(&mut text, &mut sources, web.title, web.uri);
            }
        }
    }

    Ok(InvocationResult { text, sources })
}

fn push_source_line(text: &mut String, sources: &mut Vec<Source>, label: String, uri: String) {
    text.push('\n');
    text.push_str(&label);
    text.push_str(": ");
    text.push_str(&uri);
    sources.push(Source { label, uri });
}

async fn extract_api_error(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if let Ok(parsed) = serde_json::from_str::<GeminiErrorEnvelope>(&body) {
        let code = parsed.error.code.unwrap_or(status.as_u16());
        let status_name = parsed
            .error
            .status
            .unwrap_or_else(|| status.to_string().to_uppercase());
        let message = parsed
            .error
            .message
            .unwrap_or_else(|| "unknown gemini api error".to_string());
        return format!("gemini api error {code} {status_name}: {message}");
    }

    if body.is_empty() {
        format!("gemini api request failed ({status})")
    } else {
        format!("gemini api request failed ({status}): {body}")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tools::ParamSpec;

    fn request(context: &str) -> InvocationRequest {
        InvocationRequest::new("capital of France?", context, "")
    }

    fn decoded(arguments: serde_json::Value) -> InvocationRequest {
        let params = [
            ParamSpec::string("question", "question").non_empty(),
            ParamSpec::string("context", "context").required(),
        ];
        InvocationRequest::from_arguments(&params, &arguments).expect("valid request")
    }

    fn response(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).expect("deserializes")
    }

    #[test]
    fn build_request_serializes_question_and_system_instruction() {
        let value = serde_json::to_value(build_request(&request("geo"), ContextMode::Intended))
            .expect("serializes");

        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "capital of France?");
        assert_eq!(value["systemInstruction"]["role"], "system");
        assert_eq!(
            value["systemInstruction"]["parts"][0]["text"],
            format!("{SYSTEM_PREAMBLE}\n\nContext: geo")
        );
    }

    #[test]
    fn intended_mode_appends_non_empty_context_only() {
        assert_eq!(
            system_instruction(&request("geo"), ContextMode::Intended),
            format!("{SYSTEM_PREAMBLE}\n\nContext: geo")
        );
        assert_eq!(
            system_instruction(&request(""), ContextMode::Intended),
            SYSTEM_PREAMBLE
        );
        assert_eq!(
            system_instruction(&decoded(json!({"question": "q"})), ContextMode::Intended),
            SYSTEM_PREAMBLE
        );
    }

    #[test]
    fn literal_mode_appends_only_when_context_not_a_string() {
        let literal = |arguments| system_instruction(&decoded(arguments), ContextMode::Literal);

        assert_eq!(literal(json!({"question": "q", "context": "geo"})), SYSTEM_PREAMBLE);
        assert_eq!(literal(json!({"question": "q", "context": ""})), SYSTEM_PREAMBLE);
        assert_eq!(
            literal(json!({"question": "q"})),
            format!("{SYSTEM_PREAMBLE}\n\nContext: ")
        );
        assert_eq!(
            literal(json!({"question": "q", "context": 7})),
            format!("{SYSTEM_PREAMBLE}\n\nContext: ")
        );
    }

    #[test]
    fn context_mode_parses_case_insensitively() {
        assert_eq!("Literal".parse::<ContextMode>(), Ok(ContextMode::Literal));
        assert_eq!(" intended ".parse::<ContextMode>(), Ok(ContextMode::Intended));
        assert!("sometimes".parse::<ContextMode>().is_err());
    }

    #[test]
    fn normalize_response_joins_parts_and_lists_web_grounding() {
        let result = normalize_response(response(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "A"}, {"text": "B"}]},
                "groundingMetadata": {
                    "groundingChunks": [{"web": {"title": "Doc", "uri": "http://x"}}]
                }
            }]
        })))
        .expect("response normalizes");

        assert_eq!(result.text, "AB\n\nSources: \nDoc: http://x");
        assert_eq!(
            result.sources,
            vec![Source {
                label: "Doc".to_string(),
                uri: "http://x".to_string()
            }]
        );
    }

    #[test]
    fn normalize_response_appends_citation_lines() {
        let result = normalize_response(response(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Paris"}]},
                "citationMetadata": {"citations": [{"uri": "http://ref"}]}
            }]
        })))
        .expect("response normalizes");

        assert_eq!(result.text, "Paris\n\nSource: http://ref");
        assert_eq!(result.sources.len(), 1);
    }

    #[test]
    fn normalize_response_accepts_rest_citation_sources() {
        let result = normalize_response(response(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Paris"}]},
                "citationMetadata": {"citationSources": [{"uri": "http://a"}, {"uri": "http://b"}]}
            }]
        })))
        .expect("response normalizes");

        assert_eq!(result.text, "Paris\n\nSource: http://a\n\nSource: http://b");
    }

    #[test]
    fn normalize_response_orders_citations_before_grounding() {
        let result = normalize_response(response(json!({
            "candidates": [{
                "content": {"parts": [{"text": "T"}]},
                "citationMetadata": {"citations": [{"uri": "http://c"}]},
                "groundingMetadata": {
                    "groundingChunks": [
                        {"retrievedContext": {"text": "note", "uri": "gs://bucket/doc"}},
                        {"web": {"title": "Page", "uri": "http://w"}}
                    ]
                }
            }]
        })))
        .expect("response normalizes");

        assert_eq!(
            result.text,
            "T\n\nSource: http://c\n\nSources: \nnote: gs://bucket/doc\nPage: http://w"
        );
        assert_eq!(result.sources.len(), 3);
    }

    #[test]
    fn normalize_response_keeps_header_for_empty_grounding() {
        let result = normalize_response(response(json!({
            "candidates": [{
                "content": {"parts": [{"text": "T"}]},
                "groundingMetadata": {}
            }]
        })))
        .expect("response normalizes");

        assert_eq!(result.text, "T\n\nSources: ");
        assert!(result.sources.is_empty());
    }

    #[test]
    fn normalize_response_reports_missing_candidates() {
        let err = normalize_response(GenerateContentResponse::default()).expect_err("should fail");

        match err {
            ProviderError::EmptyResponse { provider } => assert_eq!(provider, "Gemini"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn endpoint_includes_model() {
        let model = GeminiModel::new(GeminiModelConfig::new("key")).expect("client builds");

        assert_eq!(
            model.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-thinking-exp-01-21:generateContent"
        );
    }
}
