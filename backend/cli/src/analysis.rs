//! Offline analysis of the group chat summary file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use confab_config::LlmConfig;
use confab_core::{LlmMessage, LlmProvider, LlmRequest};

pub const EMPTY_SUMMARY_MESSAGE: &str =
    "No chat data available. Please run a focus group before generating an analysis.";

const ANALYSIS_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// The summary file was missing or empty; nothing was generated.
    NoChatData,
    Written { markdown: String, path: PathBuf },
}

/// Read the summary at `summary_path`, ask the model for a markdown analysis,
/// and write it to `out_path`.
pub async fn analyze(
    provider: &dyn LlmProvider,
    llm: &LlmConfig,
    summary_path: &Path,
    out_path: &Path,
) -> Result<Analysis> {
    let summary = match tokio::fs::read_to_string(summary_path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", summary_path.display())),
    };
    if summary.trim().is_empty() {
        return Ok(Analysis::NoChatData);
    }

    let request = LlmRequest {
        messages: vec![LlmMessage::system(format!(
            "Analyze the focus group chat and provide a detailed summary and analysis of the discussion in markdown format. Chat: {summary}"
        ))],
        tools: Vec::new(),
        max_tokens: llm.max_tokens,
        temperature: ANALYSIS_TEMPERATURE,
        seed: None,
    };
    let response = provider.complete(&request).await.context("Analysis request failed")?;
    let markdown = response.content.unwrap_or_default();

    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(out_path, &markdown)
        .await
        .with_context(|| format!("Failed to write {}", out_path.display()))?;
    info!(path = %out_path.display(), tokens = response.tokens_used, "Wrote chat analysis");

    Ok(Analysis::Written {
        markdown,
        path: out_path.to_path_buf(),
    })
}
