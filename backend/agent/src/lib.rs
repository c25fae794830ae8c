//! Confab agents
//!
//! Conversable agents, the two-agent and group orchestrators, the named chat
//! profiles, and the session driver that runs one exchange per user input.

pub mod chat;
pub mod conversable;
pub mod group_chat;
pub mod profiles;
pub mod relay;
pub mod session;
pub mod termination;
pub mod tool_dispatcher;
pub mod two_agent;

pub use chat::{ChatResult, LlmSettings};
pub use conversable::{register_function, AgentReply, CodeExecution, ConversableAgent};
pub use group_chat::{GroupChat, SpeakerSelection, DEFAULT_MAX_ROUND};
pub use profiles::{ChatProfile, Orchestration, ProfileContext, ProfileKind};
pub use relay::{ConsoleRelay, MessageObserver, TranscriptRelay};
pub use session::{ExchangeOutcome, SessionDriver, SessionState};
pub use termination::{is_termination_msg, TerminationPolicy, TERMINATION_MARKER};
pub use tool_dispatcher::ToolDispatcher;
pub use two_agent::{DirectChat, DEFAULT_MAX_CONSECUTIVE_AUTO_REPLY};
