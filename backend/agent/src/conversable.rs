//! A named participant that can reply with tool results, code execution
//! output, or an LLM completion.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, instrument};

use confab_core::{
    parse_content_parts, ChatMessage, ContentPart, LlmMessage, LlmRequest, MessageContent,
    SessionPhase, Tool, ToolSpec,
};
use confab_sandbox::{extract_code_blocks, CodeBlock, CodeExecutor};

use crate::chat::LlmSettings;
use crate::relay::MessageObserver;
use crate::termination::TerminationPolicy;
use crate::tool_dispatcher::ToolDispatcher;

/// Code execution settings for an executing agent.
#[derive(Clone)]
pub struct CodeExecution {
    pub executor: Arc<dyn CodeExecutor>,
    /// How many of the most recent messages are scanned for code blocks.
    pub last_n_messages: usize,
}

impl CodeExecution {
    /// Blocks from the newest message (within the scan window) that has any.
    fn find_blocks(&self, history: &[ChatMessage]) -> Option<Vec<CodeBlock>> {
        history
            .iter()
            .rev()
            .take(self.last_n_messages)
            .filter(|m| !m.content_text().is_empty())
            .map(|m| extract_code_blocks(m.content_text()))
            .find(|blocks| !blocks.is_empty())
    }
}

/// One produced reply.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub message: ChatMessage,
    pub tokens_used: u64,
}

pub struct ConversableAgent {
    name: String,
    system_message: String,
    llm: Option<LlmSettings>,
    tool_specs: Vec<ToolSpec>,
    dispatcher: Option<ToolDispatcher>,
    code_execution: Option<CodeExecution>,
    multimodal: bool,
    max_consecutive_auto_reply: Option<usize>,
    termination: Option<TerminationPolicy>,
    default_auto_reply: String,
}

impl ConversableAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_message: String::new(),
            llm: None,
            tool_specs: Vec::new(),
            dispatcher: None,
            code_execution: None,
            multimodal: false,
            max_consecutive_auto_reply: None,
            termination: None,
            default_auto_reply: String::new(),
        }
    }

    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = message.into();
        self
    }

    pub fn with_llm(mut self, llm: LlmSettings) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_code_execution(mut self, executor: Arc<dyn CodeExecutor>, last_n_messages: usize) -> Self {
        self.code_execution = Some(CodeExecution {
            executor,
            last_n_messages,
        });
        self
    }

    /// Turn `<img URL>` tags in incoming text into image parts.
    pub fn multimodal(mut self) -> Self {
        self.multimodal = true;
        self
    }

    pub fn with_max_consecutive_auto_reply(mut self, max: usize) -> Self {
        self.max_consecutive_auto_reply = Some(max);
        self
    }

    pub fn with_termination(mut self, policy: TerminationPolicy) -> Self {
        self.termination = Some(policy);
        self
    }

    pub fn with_default_auto_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_auto_reply = reply.into();
        self
    }

    /// Advertise a tool to this agent's model.
    pub fn register_for_llm(&mut self, tool: &dyn Tool) {
        self.tool_specs.retain(|s| s.name != tool.name());
        self.tool_specs.push(ToolSpec::from_tool(tool));
    }

    /// Let this agent execute a tool when another agent requests it.
    pub fn register_for_execution(&mut self, tool: Arc<dyn Tool>) {
        self.dispatcher.get_or_insert_with(ToolDispatcher::default).register(tool);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn system_message(&self) -> &str {
        &self.system_message
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    pub fn advertised_tools(&self) -> Vec<String> {
        self.tool_specs.iter().map(|s| s.name.clone()).collect()
    }

    pub fn can_execute(&self, tool_name: &str) -> bool {
        self.dispatcher.as_ref().is_some_and(|d| d.can_execute(tool_name))
    }

    pub fn can_execute_code(&self) -> bool {
        self.code_execution.is_some()
    }

    pub fn reply_cap(&self, default: usize) -> usize {
        self.max_consecutive_auto_reply.unwrap_or(default)
    }

    /// Whether this agent treats an incoming message as the end of the exchange.
    pub fn is_termination_msg(&self, message: &ChatMessage, default: TerminationPolicy) -> bool {
        self.termination
            .unwrap_or(default)
            .is_terminal(message.content.as_deref())
    }

    /// Produce the next reply to `history`.
    ///
    /// Tried in order: pending tool calls (for agents that execute tools),
    /// code blocks in the recent messages, the model, the default reply.
    #[instrument(skip_all, fields(agent = %self.name))]
    pub async fn generate_reply(
        &self,
        history: &[ChatMessage],
        observer: &dyn MessageObserver,
        name_speakers: bool,
    ) -> Result<AgentReply> {
        if let (Some(dispatcher), Some(last)) = (&self.dispatcher, history.last()) {
            if last.has_tool_calls() && last.sender != self.name {
                observer.on_phase(SessionPhase::ToolDispatch);
                let responses = dispatcher.execute_all(&last.tool_calls, observer).await;
                observer.on_phase(SessionPhase::AwaitingReply);
                return Ok(AgentReply {
                    message: ChatMessage::tool_responses(&self.name, responses),
                    tokens_used: 0,
                });
            }
        }

        if let Some(code) = &self.code_execution {
            if let Some(blocks) = code.find_blocks(history) {
                info!(blocks = blocks.len(), executor = code.executor.name(), "Executing code");
                observer.on_phase(SessionPhase::ToolDispatch);
                let result = code.executor.execute(&blocks).await;
                observer.on_phase(SessionPhase::AwaitingReply);
                return Ok(AgentReply {
                    message: ChatMessage::text(&self.name, result?.to_reply()),
                    tokens_used: 0,
                });
            }
        }

        if let Some(llm) = &self.llm {
            let request = LlmRequest {
                messages: self.build_prompt(history, name_speakers),
                tools: self.tool_specs.clone(),
                max_tokens: llm.max_tokens,
                temperature: llm.temperature,
                seed: llm.seed,
            };
            debug!(messages = request.messages.len(), tools = request.tools.len(), "Requesting completion");
            let response = llm.provider.complete(&request).await?;
            let message = if response.tool_calls.is_empty() {
                ChatMessage::text(&self.name, response.content.unwrap_or_default())
            } else {
                ChatMessage::tool_calls(&self.name, response.content, response.tool_calls)
            };
            return Ok(AgentReply {
                message,
                tokens_used: response.tokens_used,
            });
        }

        Ok(AgentReply {
            message: ChatMessage::text(&self.name, self.default_auto_reply.clone()),
            tokens_used: 0,
        })
    }

    /// Map the shared history onto this agent's view of the conversation.
    ///
    /// Own messages become assistant turns; tool results answering this
    /// agent's own calls become tool turns; everything else is user text.
    pub fn build_prompt(&self, history: &[ChatMessage], name_speakers: bool) -> Vec<LlmMessage> {
        let answered: HashSet<&str> = history
            .iter()
            .flat_map(|m| m.tool_responses.iter().map(|r| r.tool_call_id.as_str()))
            .collect();
        // Own call batches are only sent natively when every call got an answer.
        let native_calls: HashSet<&str> = history
            .iter()
            .filter(|m| m.sender == self.name && m.has_tool_calls())
            .filter(|m| m.tool_calls.iter().all(|c| answered.contains(c.id.as_str())))
            .flat_map(|m| m.tool_calls.iter().map(|c| c.id.as_str()))
            .collect();

        let mut messages = Vec::with_capacity(history.len() + 1);
        if !self.system_message.is_empty() {
            messages.push(LlmMessage::system(&self.system_message));
        }

        for msg in history {
            if msg.sender == self.name {
                if msg.has_tool_calls() && native_calls.contains(msg.tool_calls[0].id.as_str()) {
                    messages.push(LlmMessage {
                        content: msg.content.clone().map(MessageContent::Text),
                        tool_calls: msg.tool_calls.clone(),
                        ..LlmMessage::assistant("")
                    });
                } else {
                    messages.push(LlmMessage::assistant(msg.display_text()));
                }
                continue;
            }

            let own_responses: Vec<_> = msg
                .tool_responses
                .iter()
                .filter(|r| native_calls.contains(r.tool_call_id.as_str()))
                .collect();
            if !own_responses.is_empty() {
                messages.extend(
                    own_responses
                        .into_iter()
                        .map(|r| LlmMessage::tool(&r.tool_call_id, &r.content)),
                );
                continue;
            }

            let mut user = self.user_message(&msg.display_text());
            if name_speakers {
                user = user.with_name(&msg.sender);
            }
            messages.push(user);
        }
        messages
    }

    fn user_message(&self, text: &str) -> LlmMessage {
        if self.multimodal {
            let parts = parse_content_parts(text);
            if parts.iter().any(|p| matches!(p, ContentPart::ImageUrl { .. })) {
                return LlmMessage {
                    content: Some(MessageContent::Parts(parts)),
                    ..LlmMessage::user("")
                };
            }
        }
        LlmMessage::user(text)
    }
}

/// Make `caller`'s model aware of `tool` and let `executor` run it.
pub fn register_function(tool: Arc<dyn Tool>, caller: &mut ConversableAgent, executor: &mut ConversableAgent) {
    caller.register_for_llm(tool.as_ref());
    executor.register_for_execution(tool);
}
