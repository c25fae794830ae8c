use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One utterance in a conversation, attributed to the agent that produced it.
///
/// A message carries plain text, a batch of tool call requests, or the
/// responses to a previous batch. Messages are immutable once delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    /// Name of the agent that produced the message.
    pub sender: String,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_responses: Vec<ToolResponse>,
    pub timestamp: DateTime<Utc>,
}

/// A request, embedded in a message, to run a named function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Raw JSON argument object as produced by the model.
    pub arguments: String,
}

/// The result of one tool call, fed back as the next message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
}

impl ChatMessage {
    fn blank(sender: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            content: None,
            tool_calls: Vec::new(),
            tool_responses: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn text(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::blank(sender)
        }
    }

    pub fn tool_calls(
        sender: impl Into<String>,
        content: Option<String>,
        calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            content,
            tool_calls: calls,
            ..Self::blank(sender)
        }
    }

    /// Tool responses also carry a joined text body so a plain transcript reads naturally.
    pub fn tool_responses(sender: impl Into<String>, responses: Vec<ToolResponse>) -> Self {
        let joined = responses
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Self {
            content: Some(joined),
            tool_responses: responses,
            ..Self::blank(sender)
        }
    }

    /// Text content, or the empty string when there is none.
    pub fn content_text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Render the message the way the chat transcript shows it.
    pub fn display_text(&self) -> String {
        if self.tool_calls.is_empty() {
            return self.content_text().to_string();
        }
        let mut out = String::new();
        if let Some(text) = self.content.as_deref().filter(|t| !t.trim().is_empty()) {
            out.push_str(text);
            out.push_str("\n\n");
        }
        for call in &self.tool_calls {
            out.push_str(&format!(
                "***** Suggested tool call ({}): {} *****\nArguments: {}\n",
                call.id, call.name, call.arguments
            ));
        }
        out.trim_end().to_string()
    }
}

/// A piece of multimodal content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { url: String },
}

static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<img\s+([^>\s]+)\s*>").unwrap());

/// Split text into text and image parts, turning `<img URL>` tags into images.
///
/// Whitespace-only text between tags is dropped.
pub fn parse_content_parts(text: &str) -> Vec<ContentPart> {
    let mut parts = Vec::new();
    let mut last = 0;
    for caps in IMG_TAG.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        push_text(&mut parts, &text[last..whole.start()]);
        parts.push(ContentPart::ImageUrl {
            url: caps[1].to_string(),
        });
        last = whole.end();
    }
    push_text(&mut parts, &text[last..]);
    parts
}

fn push_text(parts: &mut Vec<ContentPart>, text: &str) {
    if !text.trim().is_empty() {
        parts.push(ContentPart::Text {
            text: text.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message() {
        let msg = ChatMessage::text("Assistant", "hello");
        assert_eq!(msg.sender, "Assistant");
        assert_eq!(msg.content_text(), "hello");
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_missing_content_reads_empty() {
        let msg = ChatMessage::tool_calls(
            "Assistant",
            None,
            vec![ToolCallRequest {
                id: "call_1".into(),
                name: "get_today_date".into(),
                arguments: "{}".into(),
            }],
        );
        assert_eq!(msg.content_text(), "");
        assert!(msg.display_text().contains("get_today_date"));
    }

    #[test]
    fn test_tool_responses_join_content() {
        let msg = ChatMessage::tool_responses(
            "User",
            vec![
                ToolResponse {
                    tool_call_id: "a".into(),
                    name: "calculator".into(),
                    content: "5".into(),
                },
                ToolResponse {
                    tool_call_id: "b".into(),
                    name: "calculator".into(),
                    content: "20".into(),
                },
            ],
        );
        assert_eq!(msg.content_text(), "5\n\n20");
    }

    #[test]
    fn test_parse_image_tags() {
        let parts = parse_content_parts(
            "What's the breed of this dog?\n<img https://example.com/dog.png>.",
        );
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[1],
            ContentPart::ImageUrl {
                url: "https://example.com/dog.png".into()
            }
        );
    }

    #[test]
    fn test_parse_plain_text() {
        let parts = parse_content_parts("no images here");
        assert_eq!(
            parts,
            vec![ContentPart::Text {
                text: "no images here".into()
            }]
        );
    }
}
