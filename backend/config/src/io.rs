//! Config file reading.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::defaults::DEFAULT_CONFIG_FILE;
use crate::env::resolve_env_vars_with;
use crate::schema::AppConfig;

/// Resolve which config file to read: `CONFAB_CONFIG`, else `confab.yaml` in the cwd.
pub fn config_file_path(env: &HashMap<String, String>) -> PathBuf {
    env.get("CONFAB_CONFIG")
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load and parse a YAML config file, substituting `${VAR}` references.
///
/// Returns defaults if the file doesn't exist. The second element lists
/// referenced variables that were unset.
pub async fn load_config(path: &Path, env: &HashMap<String, String>) -> Result<(AppConfig, Vec<String>)> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok((AppConfig::default(), Vec::new()));
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let (config, missing) = parse_config(&raw, env)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok((config, missing))
}

/// Parse YAML text into a config, after env substitution.
pub fn parse_config(raw: &str, env: &HashMap<String, String>) -> Result<(AppConfig, Vec<String>)> {
    let value: Value = serde_yaml::from_str(raw).context("Invalid YAML")?;
    let (mut value, missing) = resolve_env_vars_with(&value, env);
    strip_empty_strings(&mut value);
    let config = serde_json::from_value(value).context("Config does not match schema")?;
    Ok((config, missing))
}

/// Drop keys whose value is an empty string so serde defaults apply instead.
fn strip_empty_strings(value: &mut Value) {
    if let Value::Object(map) = value {
        map.retain(|_, v| !matches!(v, Value::String(s) if s.is_empty()));
        for v in map.values_mut() {
            strip_empty_strings(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_reference_falls_back_to_default() {
        let yaml = "search:\n  subscriptionKey: ${BING_SEARCH_API_KEY}\nsandbox:\n  image: ${SANDBOX_IMAGE}\n";
        let (config, missing) = parse_config(yaml, &HashMap::new()).unwrap();
        assert!(config.search.subscription_key.is_none());
        assert_eq!(config.sandbox.image, crate::defaults::DEFAULT_SANDBOX_IMAGE);
        assert_eq!(missing, vec!["BING_SEARCH_API_KEY", "SANDBOX_IMAGE"]);
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, missing) = load_config(&dir.path().join("nope.yaml"), &HashMap::new())
            .await
            .unwrap();
        assert_eq!(config.server.port, crate::defaults::DEFAULT_PORT);
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confab.yaml");
        std::fs::write(&path, "llm:\n  baseUrl: ${AOAI_API_BASE}\n  maxTokens: 300\n").unwrap();
        let env: HashMap<String, String> =
            [("AOAI_API_BASE".to_string(), "https://x.openai.azure.com/".to_string())].into();
        let (config, _) = load_config(&path, &env).await.unwrap();
        assert_eq!(config.llm.base_url.as_deref(), Some("https://x.openai.azure.com/"));
        assert_eq!(config.llm.max_tokens, 300);
    }

    #[test]
    fn test_config_file_path_override() {
        let env: HashMap<String, String> = [("CONFAB_CONFIG".to_string(), "/etc/confab.yaml".to_string())].into();
        assert_eq!(config_file_path(&env), PathBuf::from("/etc/confab.yaml"));
        assert_eq!(config_file_path(&HashMap::new()), PathBuf::from("confab.yaml"));
    }
}
