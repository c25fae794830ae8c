//! Docker-backed executor: every script runs in a fresh `docker run --rm`
//! container with the work dir mounted at `/workspace`.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::executor::{CodeExecutor, ExecutionResult, ScriptLanguage, WorkDir};

pub const CONTAINER_WORKSPACE: &str = "/workspace";

pub struct DockerExecutor {
    work_dir: WorkDir,
    image: String,
    timeout_secs: u64,
    /// Network mode passed to `docker run`.
    network_mode: String,
}

impl DockerExecutor {
    pub fn new(work_dir: WorkDir, image: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            work_dir,
            image: image.into(),
            timeout_secs,
            network_mode: "bridge".to_string(),
        }
    }

    pub fn with_network_mode(mut self, mode: impl Into<String>) -> Self {
        self.network_mode = mode.into();
        self
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    /// Arguments for `docker`, minus the program itself.
    pub fn run_args(
        &self,
        container_name: &str,
        host_dir: &Path,
        language: ScriptLanguage,
        script: &Path,
    ) -> Vec<String> {
        let interpreter = match language {
            ScriptLanguage::Python => "python",
            ScriptLanguage::Shell => "sh",
        };
        // Scripts are addressed relative to the mounted workspace.
        let script = script.to_string_lossy().replace('\\', "/");
        vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            container_name.to_string(),
            "--network".to_string(),
            self.network_mode.clone(),
            "-v".to_string(),
            format!("{}:{CONTAINER_WORKSPACE}:rw", host_dir.display()),
            "-w".to_string(),
            CONTAINER_WORKSPACE.to_string(),
            self.image.clone(),
            interpreter.to_string(),
            script,
        ]
    }

    async fn remove_container(name: &str) {
        let _ = tokio::process::Command::new("docker")
            .args(["rm", "-f", name])
            .output()
            .await;
    }
}

#[async_trait]
impl CodeExecutor for DockerExecutor {
    fn name(&self) -> &str {
        "docker"
    }

    fn work_dir(&self) -> &WorkDir {
        &self.work_dir
    }

    async fn run_script(&self, language: ScriptLanguage, script: &Path) -> Result<ExecutionResult> {
        let host_dir = tokio::fs::canonicalize(self.work_dir.path())
            .await
            .with_context(|| format!("Work dir {} is not accessible", self.work_dir.path().display()))?;
        let container_name = format!("confab-exec-{}", uuid::Uuid::new_v4().simple());
        let args = self.run_args(&container_name, &host_dir, language, script);

        info!(container = %container_name, image = %self.image, "Starting execution container");
        debug!(args = ?args, "docker");

        let timeout = Duration::from_secs(self.timeout_secs);
        let result = tokio::time::timeout(
            timeout,
            tokio::process::Command::new("docker")
                .args(&args)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                Ok(ExecutionResult {
                    exit_code: output.status.code().unwrap_or(-1),
                    output: text,
                    timed_out: false,
                })
            }
            Ok(Err(e)) => Err(e).context("Failed to run docker"),
            Err(_) => {
                warn!(container = %container_name, secs = self.timeout_secs, "Execution timed out; removing container");
                Self::remove_container(&container_name).await;
                Ok(ExecutionResult::timeout(self.timeout_secs))
            }
        }
    }
}
