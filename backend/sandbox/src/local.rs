//! Host subprocess executor. Runs scripts directly on the machine with the
//! work dir as the current directory; only use it where Docker is unavailable.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::executor::{CodeExecutor, ExecutionResult, ScriptLanguage, WorkDir};

pub struct LocalExecutor {
    work_dir: WorkDir,
    timeout_secs: u64,
    python: String,
}

impl LocalExecutor {
    pub fn new(work_dir: WorkDir, timeout_secs: u64) -> Self {
        Self {
            work_dir,
            timeout_secs,
            python: "python3".to_string(),
        }
    }

    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }
}

#[async_trait]
impl CodeExecutor for LocalExecutor {
    fn name(&self) -> &str {
        "local"
    }

    fn work_dir(&self) -> &WorkDir {
        &self.work_dir
    }

    async fn run_script(&self, language: ScriptLanguage, script: &Path) -> Result<ExecutionResult> {
        let program = match language {
            ScriptLanguage::Python => self.python.as_str(),
            ScriptLanguage::Shell => "sh",
        };
        debug!(program, script = %script.display(), "Spawning local process");

        let child = tokio::process::Command::new(program)
            .arg(script)
            .current_dir(self.work_dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {program}"))?;

        let timeout = Duration::from_secs(self.timeout_secs);
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                Ok(ExecutionResult {
                    exit_code: output.status.code().unwrap_or(-1),
                    output: text,
                    timed_out: false,
                })
            }
            Ok(Err(e)) => Err(e).context("Failed to collect process output"),
            Err(_) => {
                warn!(script = %script.display(), secs = self.timeout_secs, "Local execution timed out");
                Ok(ExecutionResult::timeout(self.timeout_secs))
            }
        }
    }
}
