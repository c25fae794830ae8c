use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;

/// Lifecycle of one submitted input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    AwaitingReply,
    ToolDispatch,
    Terminated,
    RoundLimitReached,
    Faulted,
}

impl SessionPhase {
    /// Whether an exchange is currently in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, SessionPhase::AwaitingReply | SessionPhase::ToolDispatch)
    }
}

/// Why a multi-turn exchange stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A message satisfied the termination predicate.
    Terminated,
    /// The consecutive-reply or round cap was hit.
    RoundLimitReached,
}

impl From<StopReason> for SessionPhase {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::Terminated => SessionPhase::Terminated,
            StopReason::RoundLimitReached => SessionPhase::RoundLimitReached,
        }
    }
}

/// Everything the UI shell renders, in emission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// A message produced by any agent.
    Message { message: ChatMessage },
    /// An inline, user-visible error.
    Notice {
        text: String,
        timestamp: DateTime<Utc>,
    },
    /// The session moved to a new phase.
    Phase { phase: SessionPhase },
    /// The exchange finished with a result.
    Completed {
        summary: String,
        stop_reason: StopReason,
    },
}

impl RelayEvent {
    pub fn notice(text: impl Into<String>) -> Self {
        RelayEvent::Notice {
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        write!(f, "{}", s)
    }
}
