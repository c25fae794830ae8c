//! Group chat: an ordered set of agents sharing one broadcast history, with a
//! manager choosing who speaks next.

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use confab_core::{ChatMessage, ConfabError, LlmMessage, LlmRequest, SessionPhase, StopReason};

use crate::chat::{ChatResult, LlmSettings};
use crate::conversable::ConversableAgent;
use crate::relay::MessageObserver;
use crate::termination::TerminationPolicy;

pub const DEFAULT_MAX_ROUND: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeakerSelection {
    /// The manager's model picks the next role.
    #[default]
    Auto,
    RoundRobin,
}

pub struct GroupChat {
    agents: Vec<ConversableAgent>,
    /// Total messages in one exchange, the opening one included.
    pub max_round: usize,
    pub speaker_selection: SpeakerSelection,
    pub termination: TerminationPolicy,
    manager: Option<LlmSettings>,
}

impl GroupChat {
    pub fn new(agents: Vec<ConversableAgent>) -> Self {
        Self {
            agents,
            max_round: DEFAULT_MAX_ROUND,
            speaker_selection: SpeakerSelection::default(),
            termination: TerminationPolicy::default(),
            manager: None,
        }
    }

    pub fn with_max_round(mut self, max_round: usize) -> Self {
        self.max_round = max_round.max(1);
        self
    }

    pub fn with_speaker_selection(mut self, selection: SpeakerSelection) -> Self {
        self.speaker_selection = selection;
        self
    }

    /// Model used for `Auto` speaker selection.
    pub fn with_manager(mut self, llm: LlmSettings) -> Self {
        self.manager = Some(llm);
        self
    }

    pub fn agents(&self) -> &[ConversableAgent] {
        &self.agents
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.agents.iter().position(|a| a.name() == name)
    }

    /// Drive one exchange opened by the member named `initiator`.
    #[instrument(skip_all, fields(initiator = %initiator, agents = self.agents.len()))]
    pub async fn run(
        &self,
        initiator: &str,
        opening: &str,
        history: &mut Vec<ChatMessage>,
        observer: &dyn MessageObserver,
    ) -> Result<ChatResult> {
        let mut speaker = self
            .index_of(initiator)
            .ok_or_else(|| ConfabError::Config(format!("{initiator} is not a member of the group")))?;
        let start = history.len();
        let mut replies = vec![0usize; self.agents.len()];
        let mut tokens_used = 0;
        let mut round = 0;
        let mut message = ChatMessage::text(initiator, opening);

        let stop_reason = loop {
            observer.on_message(&message)?;
            history.push(message);
            round += 1;

            if self.termination.is_terminal(history[history.len() - 1].content.as_deref()) {
                break StopReason::Terminated;
            }
            if round >= self.max_round {
                break StopReason::RoundLimitReached;
            }

            observer.on_phase(SessionPhase::AwaitingReply);
            let (next, selection_tokens) = self.select_speaker(speaker, &history[start..]).await?;
            tokens_used += selection_tokens;

            let agent = &self.agents[next];
            if agent.is_termination_msg(&history[history.len() - 1], self.termination) {
                info!(agent = %agent.name(), "Next speaker received a terminal message");
                break StopReason::Terminated;
            }
            if replies[next] >= agent.reply_cap(usize::MAX) {
                info!(agent = %agent.name(), "Consecutive reply limit reached");
                break StopReason::RoundLimitReached;
            }
            debug!(round, speaker = %agent.name(), "Next speaker");
            let reply = agent.generate_reply(&history[start..], observer, true).await?;
            replies[next] += 1;
            tokens_used += reply.tokens_used;
            speaker = next;
            message = reply.message;
        };

        info!(?stop_reason, rounds = round, tokens_used, "Group chat finished");
        Ok(ChatResult::new(history[start..].to_vec(), stop_reason, tokens_used))
    }

    /// Pick the next speaker and report the tokens spent choosing.
    ///
    /// A pending tool call goes to the only member that can execute it.
    async fn select_speaker(&self, current: usize, history: &[ChatMessage]) -> Result<(usize, u64)> {
        if let Some(last) = history.last().filter(|m| m.has_tool_calls()) {
            let executors: Vec<usize> = self
                .agents
                .iter()
                .enumerate()
                .filter(|(_, a)| last.tool_calls.iter().all(|c| a.can_execute(&c.name)))
                .map(|(i, _)| i)
                .collect();
            if let [only] = executors[..] {
                return Ok((only, 0));
            }
        }

        let round_robin = (current + 1) % self.agents.len();
        let llm = match (self.speaker_selection, &self.manager) {
            (SpeakerSelection::Auto, Some(llm)) => llm,
            _ => return Ok((round_robin, 0)),
        };

        let response = llm.provider.complete(&self.selection_request(llm, history)).await?;
        let answer = response.content.unwrap_or_default();
        match self.mentioned_agent(&answer) {
            Some(next) => Ok((next, response.tokens_used)),
            None => {
                warn!(answer = %answer, "Unparseable speaker selection; using round robin");
                Ok((round_robin, response.tokens_used))
            }
        }
    }

    fn selection_request(&self, llm: &LlmSettings, history: &[ChatMessage]) -> LlmRequest {
        let roles = self
            .agents
            .iter()
            .map(|a| format!("{}: {}", a.name(), a.system_message()))
            .collect::<Vec<_>>()
            .join("\n");
        let agent_list = format!("[{}]", self.agent_names().join(", "));

        let mut messages = vec![LlmMessage::system(format!(
            "You are in a role play game. The following roles are available:\n{roles}.\n\n\
             Read the following conversation.\n\
             Then select the next role from {agent_list} to play. Only return the role."
        ))];
        messages.extend(
            history
                .iter()
                .map(|m| LlmMessage::user(m.display_text()).with_name(&m.sender)),
        );
        messages.push(LlmMessage::system(format!(
            "Read the above conversation. Then select the next role from {agent_list} to play. Only return the role."
        )));

        LlmRequest {
            messages,
            tools: Vec::new(),
            max_tokens: llm.max_tokens,
            temperature: llm.temperature,
            seed: llm.seed,
        }
    }

    /// The single member named in `answer`, if exactly one is.
    fn mentioned_agent(&self, answer: &str) -> Option<usize> {
        let mentioned: Vec<usize> = self
            .agents
            .iter()
            .enumerate()
            .filter(|(_, a)| mentions(answer, a.name()))
            .map(|(i, _)| i)
            .collect();
        match mentioned[..] {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// Whole-word occurrence of `name` in `text`.
fn mentions(text: &str, name: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    text.match_indices(name).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + name.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}
