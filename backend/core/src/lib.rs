pub mod error;
pub mod event;
pub mod message;
pub mod session_export;
pub mod tools;
pub mod traits;

pub use error::ConfabError;
pub use event::{RelayEvent, SessionPhase, StopReason};
pub use message::{parse_content_parts, ChatMessage, ContentPart, ToolCallRequest, ToolResponse};
pub use session_export::{render_summary, TranscriptWriter};
pub use tools::ToolRegistry;
pub use traits::{
    LlmMessage, LlmProvider, LlmRequest, LlmResponse, LlmRole, MessageContent, Tool, ToolOutput,
    ToolSpec,
};
