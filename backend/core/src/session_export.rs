/// Plain-text transcript export for the offline analysis step.
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::message::ChatMessage;

/// Render one `<sender>: <content>` line per message, blank line between turns.
pub fn render_summary(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.sender, m.display_text().trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Writes the session transcript to a fixed path, replacing any previous summary.
pub struct TranscriptWriter {
    pub path: PathBuf,
}

impl TranscriptWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn write_summary(&self, messages: &[ChatMessage]) -> Result<&Path> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let body = render_summary(messages);
        tokio::fs::write(&self.path, body)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        info!(path = %self.path.display(), messages = messages.len(), "Wrote chat summary");
        Ok(&self.path)
    }
}
