//! Round-trip session driver.
//!
//! One submitted input drives one bounded exchange. The session state is
//! owned by the caller and threaded through [`SessionDriver::submit`]; the
//! driver itself holds no mutable state.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use confab_core::{ChatMessage, SessionPhase, TranscriptWriter};

use crate::chat::ChatResult;
use crate::profiles::ChatProfile;
use crate::relay::MessageObserver;

/// Per-UI-session state, passed into and returned from the driver.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub phase: SessionPhase,
    /// Set once the first exchange has started.
    pub chat_initiated: bool,
    /// Every message relayed in this session, across exchanges.
    pub transcript: Vec<ChatMessage>,
    pub last_result: Option<ChatResult>,
    pub exchanges: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExchangeOutcome {
    Completed { result: ChatResult },
    /// The exchange aborted; the message is what the user was shown.
    Faulted { message: String },
    /// The input was not accepted and no exchange ran.
    Rejected { reason: String },
}

impl ExchangeOutcome {
    /// The phase the exchange ended in.
    pub fn phase(&self) -> SessionPhase {
        match self {
            ExchangeOutcome::Completed { result } => result.stop_reason.into(),
            ExchangeOutcome::Faulted { .. } => SessionPhase::Faulted,
            ExchangeOutcome::Rejected { .. } => SessionPhase::Idle,
        }
    }
}

pub struct SessionDriver {
    profile: Arc<ChatProfile>,
    observer: Arc<dyn MessageObserver>,
    summary: Option<TranscriptWriter>,
}

impl SessionDriver {
    pub fn new(profile: Arc<ChatProfile>, observer: Arc<dyn MessageObserver>) -> Self {
        Self {
            profile,
            observer,
            summary: None,
        }
    }

    /// Rewrite a plain-text summary of the session after every exchange.
    pub fn with_summary(mut self, writer: TranscriptWriter) -> Self {
        self.summary = Some(writer);
        self
    }

    pub fn profile(&self) -> &ChatProfile {
        &self.profile
    }

    pub fn observer(&self) -> &Arc<dyn MessageObserver> {
        &self.observer
    }

    /// Run one exchange for `input`.
    ///
    /// The returned state is always back in `Idle`; the outcome says how the
    /// exchange ended. A busy state or blank input is rejected untouched.
    pub async fn submit(&self, mut state: SessionState, input: &str) -> (SessionState, ExchangeOutcome) {
        if state.phase.is_busy() {
            return (
                state,
                ExchangeOutcome::Rejected {
                    reason: "an exchange is already in flight".into(),
                },
            );
        }
        let input = input.trim();
        if input.is_empty() {
            return (
                state,
                ExchangeOutcome::Rejected {
                    reason: "input is empty".into(),
                },
            );
        }

        state.phase = SessionPhase::AwaitingReply;
        state.chat_initiated = true;
        self.observer.on_phase(state.phase);
        info!(profile = %self.profile.kind, exchange = state.exchanges + 1, "Starting exchange");

        let mut history = Vec::new();
        let run = self.profile.run(input, &mut history, self.observer.as_ref()).await;
        state.transcript.extend(history);
        state.exchanges += 1;

        let outcome = match run {
            Ok(result) => {
                self.observer.on_completed(&result);
                state.last_result = Some(result.clone());
                ExchangeOutcome::Completed { result }
            }
            Err(e) => {
                error!(profile = %self.profile.kind, error = %e, "Exchange faulted");
                let message = format!("An error occurred: {e}");
                self.observer.on_notice(&message);
                ExchangeOutcome::Faulted { message }
            }
        };
        self.observer.on_phase(outcome.phase());

        if let Some(writer) = &self.summary {
            if let Err(e) = writer.write_summary(&state.transcript).await {
                warn!(error = %e, "Failed to write chat summary");
                self.observer.on_notice(&format!("Failed to write chat summary: {e}"));
            }
        }

        state.phase = SessionPhase::Idle;
        self.observer.on_phase(state.phase);
        (state, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::LlmSettings;
    use crate::conversable::{register_function, ConversableAgent};
    use crate::profiles::{Orchestration, ProfileKind};
    use crate::relay::TranscriptRelay;
    use crate::two_agent::DirectChat;
    use confab_core::{RelayEvent, StopReason};
    use confab_llm::ScriptedProvider;
    use confab_tools::CalculatorTool;

    fn llm(provider: &Arc<ScriptedProvider>) -> LlmSettings {
        LlmSettings {
            provider: provider.clone(),
            max_tokens: 1000,
            temperature: 0.5,
            seed: Some(42),
        }
    }

    fn calculator_profile(provider: &Arc<ScriptedProvider>) -> Arc<ChatProfile> {
        let mut user = ConversableAgent::new("User");
        let mut assistant = ConversableAgent::new("Assistant").with_llm(llm(provider));
        register_function(Arc::new(CalculatorTool), &mut assistant, &mut user);
        Arc::new(ChatProfile::new(
            ProfileKind::Multitools,
            Orchestration::Direct(DirectChat::new(user, assistant)),
        ))
    }

    fn phases(relay: &TranscriptRelay) -> Vec<SessionPhase> {
        relay
            .events()
            .into_iter()
            .filter_map(|e| match e {
                RelayEvent::Phase { phase } => Some(phase),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_calculator_exchange() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::tool_call("call_1", "calculator", serde_json::json!({"a": 2, "b": 3, "operator": "+"})),
            ScriptedProvider::tool_call("call_2", "calculator", serde_json::json!({"a": 5, "b": 4, "operator": "*"})),
            ScriptedProvider::text("(2+3)*4 = 20. TERMINATE"),
        ]));
        let relay = Arc::new(TranscriptRelay::new());
        let driver = SessionDriver::new(calculator_profile(&provider), relay.clone());

        let (state, outcome) = driver.submit(SessionState::default(), "What is (2+3)*4?").await;

        let ExchangeOutcome::Completed { result } = outcome else {
            panic!("exchange should complete");
        };
        assert_eq!(result.stop_reason, StopReason::Terminated);
        assert_eq!(result.summary, "(2+3)*4 = 20.");
        let tool_results: Vec<&str> = state
            .transcript
            .iter()
            .flat_map(|m| m.tool_responses.iter().map(|r| r.content.as_str()))
            .collect();
        assert_eq!(tool_results, vec!["5", "20"]);
        assert_eq!(state.phase, SessionPhase::Idle);
        assert!(state.chat_initiated);
        assert_eq!(state.exchanges, 1);

        let seen = phases(&relay);
        assert_eq!(seen.first(), Some(&SessionPhase::AwaitingReply));
        assert!(seen.contains(&SessionPhase::ToolDispatch));
        assert_eq!(&seen[seen.len() - 2..], &[SessionPhase::Terminated, SessionPhase::Idle]);
    }

    #[tokio::test]
    async fn test_busy_and_blank_input_rejected() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let relay = Arc::new(TranscriptRelay::new());
        let driver = SessionDriver::new(calculator_profile(&provider), relay.clone());

        let (state, outcome) = driver.submit(SessionState::default(), "   ").await;
        assert!(matches!(outcome, ExchangeOutcome::Rejected { .. }));
        assert!(!state.chat_initiated);

        let busy = SessionState {
            phase: SessionPhase::ToolDispatch,
            ..Default::default()
        };
        let (state, outcome) = driver.submit(busy, "hello").await;
        assert!(matches!(outcome, ExchangeOutcome::Rejected { .. }));
        assert_eq!(state.phase, SessionPhase::ToolDispatch);
        assert!(relay.events().is_empty());
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_fault_reports_notice_and_returns_to_idle() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let relay = Arc::new(TranscriptRelay::new());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_summary.txt");
        let driver = SessionDriver::new(calculator_profile(&provider), relay.clone())
            .with_summary(TranscriptWriter::new(&path));

        let (state, outcome) = driver.submit(SessionState::default(), "hi").await;

        let ExchangeOutcome::Faulted { message } = outcome else {
            panic!("exchange should fault");
        };
        assert!(message.starts_with("An error occurred: "));
        assert_eq!(relay.notices(), vec![message]);
        assert_eq!(state.phase, SessionPhase::Idle);
        assert_eq!(state.transcript.len(), 1);
        assert!(state.last_result.is_none());

        let seen = phases(&relay);
        assert_eq!(&seen[seen.len() - 2..], &[SessionPhase::Faulted, SessionPhase::Idle]);
        let summary = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(summary, "User: hi");
    }

    #[tokio::test]
    async fn test_transcript_accumulates_across_exchanges() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::text("First. TERMINATE"),
            ScriptedProvider::text("Second. TERMINATE"),
        ]));
        let relay = Arc::new(TranscriptRelay::new());
        let driver = SessionDriver::new(calculator_profile(&provider), relay);

        let (state, _) = driver.submit(SessionState::default(), "one").await;
        let (state, outcome) = driver.submit(state, "two").await;

        assert!(matches!(outcome, ExchangeOutcome::Completed { .. }));
        assert_eq!(state.exchanges, 2);
        assert_eq!(state.transcript.len(), 4);
        assert_eq!(state.last_result.map(|r| r.summary).as_deref(), Some("Second."));
        // Each exchange starts from a fresh conversation.
        assert_eq!(provider.requests()[1].messages.len(), 1);
    }
}
