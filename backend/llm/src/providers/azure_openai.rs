use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use confab_config::LlmConfig;
use confab_core::{
    ConfabError, ContentPart, LlmMessage, LlmProvider, LlmRequest, LlmResponse, LlmRole,
    MessageContent, ToolCallRequest,
};
use confab_logging::redact_sensitive_data;

use crate::credential::{shared_credential, CredentialProvider};

const PROVIDER_NAME: &str = "azure-openai";

/// Azure OpenAI chat completions (`/openai/deployments/{model}/chat/completions`).
pub struct AzureOpenAiProvider {
    client: Client,
    base_url: Option<String>,
    deployment: Option<String>,
    api_version: String,
    credential: Arc<dyn CredentialProvider>,
}

impl AzureOpenAiProvider {
    pub fn new(
        base_url: Option<String>,
        deployment: Option<String>,
        api_version: impl Into<String>,
        credential: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url,
            deployment,
            api_version: api_version.into(),
            credential,
        }
    }

    /// Build from config with the process-wide credential.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            deployment: config.model.clone(),
            api_version: config.api_version.clone(),
            credential: shared_credential(config),
        })
    }

    pub fn deployment(&self) -> Option<&str> {
        self.deployment.as_deref()
    }

    fn endpoint(&self) -> Result<String, ConfabError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| ConfabError::Config("chat endpoint base URL is not set".into()))?;
        let deployment = self
            .deployment
            .as_deref()
            .ok_or_else(|| ConfabError::Config("chat model deployment is not set".into()))?;
        Ok(format!(
            "{}/openai/deployments/{}/chat/completions",
            base.trim_end_matches('/'),
            deployment
        ))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Serialize)]
struct WireMessage {
    role: LlmRole,
    content: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunction,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireToolDef<'a>,
}

#[derive(Serialize)]
struct WireToolDef<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}

fn to_wire(message: &LlmMessage) -> WireMessage {
    let content = match &message.content {
        None => Value::Null,
        Some(MessageContent::Text(text)) => Value::String(text.clone()),
        Some(MessageContent::Parts(parts)) => Value::Array(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => serde_json::json!({"type": "text", "text": text}),
                    ContentPart::ImageUrl { url } => {
                        serde_json::json!({"type": "image_url", "image_url": {"url": url}})
                    }
                })
                .collect(),
        ),
    };
    WireMessage {
        role: message.role,
        content,
        name: message.name.as_deref().map(sanitize_name),
        tool_calls: message
            .tool_calls
            .iter()
            .map(|c| WireToolCall {
                id: c.id.clone(),
                kind: function_type(),
                function: WireFunction {
                    name: c.name.clone(),
                    arguments: c.arguments.clone(),
                },
            })
            .collect(),
        tool_call_id: message.tool_call_id.clone(),
    }
}

/// The `name` field only accepts `[a-zA-Z0-9_-]`.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

#[async_trait]
impl LlmProvider for AzureOpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let start = Instant::now();
        let url = self.endpoint()?;

        let body = ChatRequest {
            messages: request.messages.iter().map(to_wire).collect(),
            tools: request
                .tools
                .iter()
                .map(|t| WireTool {
                    kind: "function",
                    function: WireToolDef {
                        name: &t.name,
                        description: &t.description,
                        parameters: &t.parameters,
                    },
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            seed: request.seed,
        };

        debug!(
            deployment = ?self.deployment,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Sending chat completion request"
        );

        let auth = self.credential.authorize().await?;
        let response = auth
            .apply(self.client.post(&url))
            .query(&[("api-version", self.api_version.as_str())])
            .json(&body)
            .send()
            .await
            .context("Chat completion HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ConfabError::Llm {
                provider: PROVIDER_NAME.to_string(),
                message: format!("{}: {}", status, redact_sensitive_data(&error_body)),
            }
            .into());
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let message = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ConfabError::Llm {
                provider: PROVIDER_NAME.to_string(),
                message: "response contained no choices".into(),
            })?;

        Ok(LlmResponse {
            content: message.content,
            tool_calls: message
                .tool_calls
                .into_iter()
                .map(|c| ToolCallRequest {
                    id: c.id,
                    name: c.function.name,
                    arguments: c.function.arguments,
                })
                .collect(),
            provider: PROVIDER_NAME.to_string(),
            model: chat_response
                .model
                .or_else(|| self.deployment.clone())
                .unwrap_or_default(),
            tokens_used: chat_response
                .usage
                .and_then(|u| u.total_tokens)
                .unwrap_or(0),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
