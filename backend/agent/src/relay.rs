//! Message relay: mirrors everything the orchestrator produces to a UI.

use std::io::Write;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use tokio::sync::broadcast;
use tracing::debug;

use confab_core::{ChatMessage, RelayEvent, SessionPhase};

use crate::chat::ChatResult;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Callback registered with an orchestrator.
///
/// `on_message` runs for every delivered message, in delivery order, before
/// the receiving agent processes it. A failure aborts the exchange.
pub trait MessageObserver: Send + Sync {
    fn on_message(&self, message: &ChatMessage) -> Result<()>;

    /// An inline, user-visible error that did not abort the exchange.
    fn on_notice(&self, text: &str);

    fn on_phase(&self, phase: SessionPhase);

    fn on_completed(&self, _result: &ChatResult) {}
}

/// Relay for the web shell: keeps an ordered event log and fans events out
/// to live subscribers.
pub struct TranscriptRelay {
    events: Mutex<Vec<RelayEvent>>,
    sender: broadcast::Sender<RelayEvent>,
}

impl TranscriptRelay {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            events: Mutex::new(Vec::new()),
            sender,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.sender.subscribe()
    }

    /// Every event relayed so far.
    pub fn events(&self) -> Vec<RelayEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Relayed messages only, in order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RelayEvent::Message { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RelayEvent::Notice { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: RelayEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow!("transcript log poisoned"))?
            .push(event.clone());
        // No subscribers is fine; the log still has it.
        let _ = self.sender.send(event);
        Ok(())
    }
}

impl Default for TranscriptRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageObserver for TranscriptRelay {
    fn on_message(&self, message: &ChatMessage) -> Result<()> {
        debug!(sender = %message.sender, "Relaying message");
        self.record(RelayEvent::Message {
            message: message.clone(),
        })
    }

    fn on_notice(&self, text: &str) {
        let _ = self.record(RelayEvent::notice(text));
    }

    fn on_phase(&self, phase: SessionPhase) {
        let _ = self.record(RelayEvent::Phase { phase });
    }

    fn on_completed(&self, result: &ChatResult) {
        let _ = self.record(RelayEvent::Completed {
            summary: result.summary.clone(),
            stop_reason: result.stop_reason,
        });
    }
}

/// Relay for the terminal: prints each message as it arrives.
pub struct ConsoleRelay {
    color: bool,
}

impl ConsoleRelay {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn write_message(&self, out: &mut impl Write, message: &ChatMessage) -> std::io::Result<()> {
        if self.color {
            writeln!(out, "\x1b[1m\x1b[33m{}\x1b[0m:", message.sender)?;
        } else {
            writeln!(out, "{}:", message.sender)?;
        }
        writeln!(out, "{}", message.display_text())?;
        writeln!(out, "{}", "-".repeat(80))?;
        out.flush()
    }
}

impl MessageObserver for ConsoleRelay {
    fn on_message(&self, message: &ChatMessage) -> Result<()> {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        self.write_message(&mut lock, message)?;
        Ok(())
    }

    fn on_notice(&self, text: &str) {
        if self.color {
            eprintln!("\x1b[31m\x1b[1m✖\x1b[0m {text}");
        } else {
            eprintln!("ERROR: {text}");
        }
    }

    fn on_phase(&self, phase: SessionPhase) {
        debug!(%phase, "Session phase");
    }
}
