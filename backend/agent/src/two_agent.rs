//! Two-agent chat: the initiator and the recipient take turns until one of
//! them receives a terminal message or runs out of consecutive replies.

use anyhow::Result;
use tracing::{info, instrument};

use confab_core::{ChatMessage, SessionPhase, StopReason};

use crate::chat::ChatResult;
use crate::conversable::ConversableAgent;
use crate::relay::MessageObserver;
use crate::termination::TerminationPolicy;

pub const DEFAULT_MAX_CONSECUTIVE_AUTO_REPLY: usize = 5;

pub struct DirectChat {
    pub initiator: ConversableAgent,
    pub recipient: ConversableAgent,
    /// Reply cap for agents that do not set their own.
    pub max_consecutive_auto_reply: usize,
    pub termination: TerminationPolicy,
}

impl DirectChat {
    pub fn new(initiator: ConversableAgent, recipient: ConversableAgent) -> Self {
        Self {
            initiator,
            recipient,
            max_consecutive_auto_reply: DEFAULT_MAX_CONSECUTIVE_AUTO_REPLY,
            termination: TerminationPolicy::default(),
        }
    }

    pub fn with_max_consecutive_auto_reply(mut self, max: usize) -> Self {
        self.max_consecutive_auto_reply = max;
        self
    }

    pub fn agents(&self) -> [&ConversableAgent; 2] {
        [&self.initiator, &self.recipient]
    }

    /// Drive one exchange opened by the initiator with `opening`.
    ///
    /// Every delivered message is appended to `history` and relayed before
    /// the receiving agent looks at it, so a fault leaves the partial
    /// conversation in place.
    #[instrument(skip_all, fields(initiator = %self.initiator.name(), recipient = %self.recipient.name()))]
    pub async fn run(
        &self,
        opening: &str,
        history: &mut Vec<ChatMessage>,
        observer: &dyn MessageObserver,
    ) -> Result<ChatResult> {
        let agents = self.agents();
        let mut replies = [0usize; 2];
        let mut tokens_used = 0;
        let start = history.len();

        let mut message = ChatMessage::text(self.initiator.name(), opening);
        // Index of the agent that receives `message`.
        let mut receiver = 1;

        let stop_reason = loop {
            observer.on_message(&message)?;
            history.push(message);
            let incoming = &history[history.len() - 1];

            let agent = agents[receiver];
            if agent.is_termination_msg(incoming, self.termination) {
                break StopReason::Terminated;
            }
            if replies[receiver] >= agent.reply_cap(self.max_consecutive_auto_reply) {
                info!(agent = %agent.name(), "Consecutive reply limit reached");
                break StopReason::RoundLimitReached;
            }

            observer.on_phase(SessionPhase::AwaitingReply);
            let reply = agent.generate_reply(&history[start..], observer, false).await?;
            replies[receiver] += 1;
            tokens_used += reply.tokens_used;
            message = reply.message;
            receiver = 1 - receiver;
        };

        info!(?stop_reason, messages = history.len() - start, tokens_used, "Chat finished");
        Ok(ChatResult::new(history[start..].to_vec(), stop_reason, tokens_used))
    }
}
