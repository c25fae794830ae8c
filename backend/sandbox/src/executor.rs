//! Executor seam shared by the Docker and host backends.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use confab_core::ConfabError;

use crate::code_block::CodeBlock;

/// Exit code reported when a run exceeds its wall-clock budget.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Interpreter family for a code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLanguage {
    Python,
    Shell,
}

impl ScriptLanguage {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "python" | "py" | "python3" => Some(Self::Python),
            "sh" | "bash" | "shell" => Some(Self::Shell),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::Shell => "sh",
        }
    }
}

/// Captured outcome of running one or more blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub output: String,
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            output: output.into(),
            timed_out: false,
        }
    }

    pub fn timeout(secs: u64) -> Self {
        Self {
            exit_code: TIMEOUT_EXIT_CODE,
            output: format!("Timeout after {secs}s"),
            timed_out: true,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// The text an executing agent replies with.
    pub fn to_reply(&self) -> String {
        let status = if self.succeeded() {
            "execution succeeded"
        } else {
            "execution failed"
        };
        format!(
            "exitcode: {} ({status})\nCode output: {}",
            self.exit_code, self.output
        )
    }
}

/// Directory shared by every run in a session.
#[derive(Debug, Clone)]
pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn ensure(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.path)
            .await
            .with_context(|| format!("Failed to create work dir {}", self.path.display()))
    }

    /// Remove everything inside the directory, keeping the directory itself.
    /// Returns the number of entries removed.
    pub async fn clear(&self) -> Result<usize> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(0);
        }
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path).await?;
            } else {
                tokio::fs::remove_file(&path).await?;
            }
            removed += 1;
        }
        info!(dir = %self.path.display(), removed, "Cleared work dir");
        Ok(removed)
    }

    /// Names of the entries currently in the directory, sorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(names);
        }
        let mut entries = tokio::fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Write a script and return its path relative to the work dir.
    pub async fn write_script(&self, filename: &str, code: &str) -> Result<PathBuf> {
        let relative = PathBuf::from(filename);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(ConfabError::Sandbox(format!("{filename} is outside the work dir")).into());
        }

        let full = self.path.join(&relative);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, code)
            .await
            .with_context(|| format!("Failed to write {}", full.display()))?;
        debug!(script = %full.display(), "Wrote script");
        Ok(relative)
    }
}

/// Runs code blocks against a work dir.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    fn name(&self) -> &str;

    fn work_dir(&self) -> &WorkDir;

    /// Run one script that already exists in the work dir.
    async fn run_script(&self, language: ScriptLanguage, script: &Path) -> Result<ExecutionResult>;

    /// Run blocks in order, stopping at the first failure.
    ///
    /// Output of successive blocks is joined with newlines. An unsupported
    /// language fails the run without touching the interpreter.
    async fn execute(&self, blocks: &[CodeBlock]) -> Result<ExecutionResult> {
        self.work_dir().ensure().await?;
        let mut outputs = Vec::with_capacity(blocks.len());
        let mut last = ExecutionResult {
            exit_code: 0,
            output: String::new(),
            timed_out: false,
        };

        for block in blocks {
            let Some(language) = ScriptLanguage::from_tag(&block.language) else {
                warn!(language = %block.language, "Unsupported code block language");
                outputs.push(format!("unknown language {}", block.language));
                last = ExecutionResult::failed(String::new());
                break;
            };

            let filename = block.filename.clone().unwrap_or_else(|| {
                format!("tmp_code_{}.{}", uuid::Uuid::new_v4().simple(), language.extension())
            });
            let script = match self.work_dir().write_script(&filename, &block.code).await {
                Ok(path) => path,
                Err(e) => {
                    outputs.push(e.to_string());
                    last = ExecutionResult::failed(String::new());
                    break;
                }
            };

            info!(executor = self.name(), script = %script.display(), "Executing code block");
            last = self.run_script(language, &script).await?;
            outputs.push(last.output.clone());
            if !last.succeeded() {
                break;
            }
        }

        last.output = outputs.join("\n");
        Ok(last)
    }
}
