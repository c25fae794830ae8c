//! Runtime configuration for the Confab relay.
//!
//! Provides:
//! - Typed config schema (chat, image, search, sandbox, server, logging, session)
//! - `.env` loading and `${ENV_VAR}` substitution in an optional YAML file
//! - Environment variable overrides
//! - Config redaction for safe logging/display
//! - Non-fatal validation

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use env::{apply_env_overrides, collect_referenced_vars, resolve_env_vars_with};
pub use io::{config_file_path, load_config, parse_config};
pub use redact::{collect_redacted_paths, redact};
pub use schema::{
    AppConfig, ImageConfig, LlmConfig, LoggingConfig, SandboxConfig, SearchConfig, ServerConfig,
    SessionConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::Result;
use std::collections::HashMap;

impl AppConfig {
    /// Load the process configuration: `.env`, optional YAML file, then environment overrides.
    ///
    /// Called once at startup.
    pub async fn load() -> Result<AppConfig> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "Failed to read .env"),
        }
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_with(&env).await
    }

    /// Same as [`AppConfig::load`] but against an explicit environment map.
    pub async fn load_with(env: &HashMap<String, String>) -> Result<AppConfig> {
        let path = config_file_path(env);
        let (config, missing) = load_config(&path, env).await?;
        for var in &missing {
            tracing::warn!(var = %var, path = %path.display(), "Config references unset variable");
        }
        let config = apply_env_overrides(config, env);

        let report = validate(&config);
        for warning in &report.warnings {
            tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
        }
        if !report.is_valid() {
            let joined = report
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            anyhow::bail!("invalid configuration: {joined}");
        }
        Ok(config)
    }

    /// Redacted JSON snapshot for display.
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .map(|v| redact(&v))
            .unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_with_env_only() {
        let dir = tempfile::tempdir().unwrap();
        let env: HashMap<String, String> = [
            (
                "CONFAB_CONFIG".to_string(),
                dir.path().join("absent.yaml").display().to_string(),
            ),
            ("AOAI_API_KEY".to_string(), "super-secret-key".to_string()),
        ]
        .into();
        let config = AppConfig::load_with(&env).await.unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("super-secret-key"));
        assert_eq!(config.redacted()["llm"]["apiKey"], "supe***");
    }

    #[tokio::test]
    async fn test_invalid_values_fail_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confab.yaml");
        std::fs::write(&path, "llm:\n  maxTokens: 0\n").unwrap();
        let env: HashMap<String, String> =
            [("CONFAB_CONFIG".to_string(), path.display().to_string())].into();
        assert!(AppConfig::load_with(&env).await.is_err());
    }
}
