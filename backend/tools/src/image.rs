//! Image generation through an Azure-hosted DALL-E deployment.
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use confab_config::AppConfig;
use confab_core::{ConfabError, Tool, ToolOutput};
use confab_llm::CredentialProvider;
use confab_logging::redact_sensitive_data;

use crate::FailureMode;

pub const IMAGE_TOOL_NAME: &str = "image_generator";

#[derive(Debug, Deserialize)]
struct ImageInput {
    prompt: String,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

pub struct ImageGeneratorTool {
    client: Client,
    base_url: Option<String>,
    deployment: Option<String>,
    api_version: String,
    credential: Arc<dyn CredentialProvider>,
    failure_mode: FailureMode,
}

impl ImageGeneratorTool {
    pub fn new(
        base_url: Option<String>,
        deployment: Option<String>,
        api_version: impl Into<String>,
        credential: Arc<dyn CredentialProvider>,
        failure_mode: FailureMode,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url,
            deployment,
            api_version: api_version.into(),
            credential,
            failure_mode,
        }
    }

    /// Uses the image section of the config; the base URL falls back to the chat endpoint's.
    pub fn from_config(
        config: &AppConfig,
        credential: Arc<dyn CredentialProvider>,
        failure_mode: FailureMode,
    ) -> Self {
        Self::new(
            config.image.effective_base_url(&config.llm).map(str::to_string),
            config.image.model.clone(),
            config.image.api_version.clone(),
            credential,
            failure_mode,
        )
    }

    /// Generate one image and return its URL.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| ConfabError::Config("image endpoint base URL is not set".into()))?;
        let deployment = self
            .deployment
            .as_deref()
            .ok_or_else(|| ConfabError::Config("image model deployment is not set".into()))?;
        let url = format!(
            "{}/openai/deployments/{}/images/generations",
            base.trim_end_matches('/'),
            deployment
        );

        let auth = self.credential.authorize().await?;
        let resp = auth
            .apply(self.client.post(&url))
            .query(&[("api-version", self.api_version.as_str())])
            .json(&serde_json::json!({"prompt": prompt, "n": 1}))
            .send()
            .await
            .map_err(|e| ConfabError::Transport {
                service: "image generation".into(),
                status: 0,
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConfabError::Transport {
                service: "image generation".into(),
                status: status.as_u16(),
                message: redact_sensitive_data(&body),
            }
            .into());
        }

        let parsed: ImageResponse = resp.json().await.map_err(|e| ConfabError::Transport {
            service: "image generation".into(),
            status: status.as_u16(),
            message: format!("unexpected response body: {e}"),
        })?;
        let image_url = parsed
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ConfabError::Transport {
                service: "image generation".into(),
                status: status.as_u16(),
                message: "response contained no image".into(),
            })?;

        info!(deployment = %deployment, "Generated image");
        Ok(image_url)
    }
}

#[async_trait]
impl Tool for ImageGeneratorTool {
    fn name(&self) -> &str {
        IMAGE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "A image generator that calls Dall-E API to generate an image based on the input prompt"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "prompt": {"type": "string", "description": "Description of the image to generate"}
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let input: ImageInput =
            serde_json::from_value(args).map_err(|e| ConfabError::InvalidArguments {
                tool: IMAGE_TOOL_NAME.into(),
                message: e.to_string(),
            })?;

        match self.generate(&input.prompt).await {
            Ok(url) => Ok(ToolOutput::text(url)),
            Err(e) => match self.failure_mode {
                FailureMode::Propagate => Err(e),
                FailureMode::ReportEmpty => {
                    warn!(error = %e, "Image generation failed");
                    Ok(ToolOutput::degraded("", format!("Error during image generation: {e}")))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_llm::ApiKeyCredential;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool(server: &MockServer, mode: FailureMode) -> ImageGeneratorTool {
        ImageGeneratorTool::new(
            Some(server.uri()),
            Some("dall-e-3".into()),
            "2024-02-01",
            Arc::new(ApiKeyCredential::new("img-key")),
            mode,
        )
    }

    #[tokio::test]
    async fn test_returns_first_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/dall-e-3/images/generations"))
            .and(query_param("api-version", "2024-02-01"))
            .and(header("api-key", "img-key"))
            .and(body_json(serde_json::json!({"prompt": "a red bicycle", "n": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "created": 1700000000,
                "data": [{"url": "https://images.example/red-bicycle.png", "revised_prompt": "x"}]
            })))
            .mount(&server)
            .await;

        let out = tool(&server, FailureMode::Propagate)
            .execute(serde_json::json!({"prompt": "a red bicycle"}))
            .await
            .unwrap();
        assert_eq!(out.content, "https://images.example/red-bicycle.png");
        assert!(out.notice.is_none());
    }

    #[tokio::test]
    async fn test_empty_url_is_reported_inline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"url": ""}]
            })))
            .mount(&server)
            .await;

        let out = tool(&server, FailureMode::ReportEmpty)
            .execute(serde_json::json!({"prompt": "a red bicycle"}))
            .await
            .unwrap();
        assert_eq!(out.content, "");
        let notice = out.notice.unwrap();
        assert!(notice.starts_with("Error during image generation"));
        assert!(notice.contains("response contained no image"));

        let err = tool(&server, FailureMode::Propagate)
            .generate("a red bicycle")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfabError>(),
            Some(ConfabError::Transport { .. })
        ));
    }

    #[test]
    fn test_from_config_falls_back_to_chat_endpoint() {
        let mut config = AppConfig::default();
        config.llm.base_url = Some("https://chat.example".into());
        config.image.model = Some("dall-e-3".into());
        let t = ImageGeneratorTool::from_config(
            &config,
            Arc::new(ApiKeyCredential::new("k")),
            FailureMode::Propagate,
        );
        assert_eq!(t.base_url.as_deref(), Some("https://chat.example"));
        assert_eq!(t.deployment.as_deref(), Some("dall-e-3"));
    }

    #[tokio::test]
    async fn test_content_filter_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"error":{"code":"contentFilter"}}"#),
            )
            .mount(&server)
            .await;

        let err = tool(&server, FailureMode::Propagate)
            .execute(serde_json::json!({"prompt": "something"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn test_failure_reported_inline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let out = tool(&server, FailureMode::ReportEmpty)
            .execute(serde_json::json!({"prompt": "a red bicycle"}))
            .await
            .unwrap();
        assert_eq!(out.content, "");
        assert!(out
            .notice
            .unwrap()
            .starts_with("Error during image generation"));
    }

    #[tokio::test]
    async fn test_missing_prompt_is_invalid_arguments() {
        let server = MockServer::start().await;
        let err = tool(&server, FailureMode::ReportEmpty)
            .execute(serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfabError>(),
            Some(ConfabError::InvalidArguments { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_deployment_is_config_error() {
        let t = ImageGeneratorTool::new(
            Some("https://unused.example".into()),
            None,
            "2024-02-01",
            Arc::new(ApiKeyCredential::new("k")),
            FailureMode::Propagate,
        );
        let err = t.generate("x").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfabError>(),
            Some(ConfabError::Config(_))
        ));
    }
}
