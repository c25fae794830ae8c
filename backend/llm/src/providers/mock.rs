//! Scripted provider for tests and offline demos.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use confab_core::{ConfabError, LlmProvider, LlmRequest, LlmResponse, ToolCallRequest};

/// Replays a fixed queue of responses and records every request it receives.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<LlmResponse>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: impl IntoIterator<Item = LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn text(content: impl Into<String>) -> LlmResponse {
        LlmResponse {
            content: Some(content.into()),
            provider: "scripted".into(),
            model: "scripted".into(),
            tokens_used: 10,
            ..Default::default()
        }
    }

    pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> LlmResponse {
        LlmResponse {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: id.into(),
                name: name.into(),
                arguments: arguments.to_string(),
            }],
            provider: "scripted".into(),
            model: "scripted".into(),
            tokens_used: 10,
            ..Default::default()
        }
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        let next = self
            .responses
            .lock()
            .map_err(|_| anyhow::anyhow!("scripted provider poisoned"))?
            .pop_front();
        next.ok_or_else(|| {
            ConfabError::Llm {
                provider: "scripted".into(),
                message: "script exhausted".into(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_core::LlmMessage;

    fn request() -> LlmRequest {
        LlmRequest {
            messages: vec![LlmMessage::user("hi")],
            tools: Vec::new(),
            max_tokens: 10,
            temperature: 0.0,
            seed: None,
        }
    }

    #[tokio::test]
    async fn test_replays_in_order_then_errors() {
        let provider = ScriptedProvider::new([
            ScriptedProvider::text("one"),
            ScriptedProvider::text("two"),
        ]);
        assert_eq!(provider.complete(&request()).await.unwrap().content.as_deref(), Some("one"));
        assert_eq!(provider.complete(&request()).await.unwrap().content.as_deref(), Some("two"));
        assert!(provider.complete(&request()).await.is_err());
        assert_eq!(provider.requests().len(), 3);
    }
}
