use std::sync::Arc;

use serde::Serialize;

use confab_config::LlmConfig;
use confab_core::{ChatMessage, LlmProvider, StopReason};

use crate::termination::TERMINATION_MARKER;

/// Outcome of one multi-turn exchange.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResult {
    pub chat_history: Vec<ChatMessage>,
    /// Last non-empty message with the termination marker removed.
    pub summary: String,
    pub stop_reason: StopReason,
    pub tokens_used: u64,
}

impl ChatResult {
    pub fn new(chat_history: Vec<ChatMessage>, stop_reason: StopReason, tokens_used: u64) -> Self {
        let summary = last_message_summary(&chat_history);
        Self {
            chat_history,
            summary,
            stop_reason,
            tokens_used,
        }
    }
}

fn last_message_summary(history: &[ChatMessage]) -> String {
    history
        .iter()
        .rev()
        .map(|m| m.content_text().replace(TERMINATION_MARKER, ""))
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// Model and sampling settings for an LLM-backed agent.
#[derive(Clone)]
pub struct LlmSettings {
    pub provider: Arc<dyn LlmProvider>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub seed: Option<u64>,
}

impl LlmSettings {
    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            seed: config.cache_seed,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}
