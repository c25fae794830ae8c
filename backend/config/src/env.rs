//! Environment handling: `${VAR}` substitution in config files and
//! environment-variable overrides.
//!
//! Only uppercase-ish `[A-Za-z_][A-Za-z0-9_]*` variable names are matched.
//! A missing variable resolves to the empty string; the caller is told which
//! names were missing so it can warn, but loading never fails on them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

use crate::schema::AppConfig;

static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

pub const AOAI_API_BASE: &str = "AOAI_API_BASE";
pub const AOAI_API_VERSION: &str = "AOAI_API_VERSION";
pub const AOAI_API_KEY: &str = "AOAI_API_KEY";
pub const CHAT_MODEL_NAME: &str = "GPT_4o_mini_Model_Name";
pub const DALL_E_MODEL_NAME: &str = "DALL_E_MODEL_NAME";
pub const IMAGE_API_VERSION: &str = "IMAGE_API_VERSION";
pub const BING_SEARCH_API_KEY: &str = "BING_SEARCH_API_KEY";
pub const BING_SEARCH_API_ENDPOINT: &str = "BING_SEARCH_API_ENDPOINT";

/// Substitute `${VAR}` references in every string leaf of a value tree.
///
/// Returns the substituted tree and the sorted names of variables that were unset.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> (Value, Vec<String>) {
    let mut missing = Vec::new();
    let resolved = substitute_value(value, env, &mut missing);
    missing.sort();
    missing.dedup();
    (resolved, missing)
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, missing: &mut Vec<String>) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_string(s, env, missing)),
        Value::Array(arr) => Value::Array(
            arr.iter()
                .map(|v| substitute_value(v, env, missing))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, env, missing)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, missing: &mut Vec<String>) -> String {
    if !s.contains("${") {
        return s.to_string();
    }
    ENV_VAR_PATTERN
        .replace_all(s, |caps: &regex::Captures| match env.get(&caps[1]) {
            Some(val) => val.clone(),
            None => {
                missing.push(caps[1].to_string());
                String::new()
            }
        })
        .to_string()
}

/// Collect all env var names referenced in a value tree (for diagnostics).
pub fn collect_referenced_vars(value: &Value) -> Vec<String> {
    let mut vars = Vec::new();
    collect_vars_recursive(value, &mut vars);
    vars.sort();
    vars.dedup();
    vars
}

fn collect_vars_recursive(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for caps in ENV_VAR_PATTERN.captures_iter(s) {
                out.push(caps[1].to_string());
            }
        }
        Value::Array(arr) => arr.iter().for_each(|v| collect_vars_recursive(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_vars_recursive(v, out)),
        _ => {}
    }
}

/// Apply environment overrides on top of file/default values.
///
/// Empty variables count as unset. Unparseable numbers are ignored with a warning.
pub fn apply_env_overrides(mut config: AppConfig, env: &HashMap<String, String>) -> AppConfig {
    let get = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(v) = get(AOAI_API_BASE) {
        config.llm.base_url = Some(v.to_string());
    }
    if let Some(v) = get(AOAI_API_VERSION) {
        config.llm.api_version = v.to_string();
    }
    if let Some(v) = get(AOAI_API_KEY) {
        config.llm.api_key = Some(v.to_string());
    }
    if let Some(v) = get(CHAT_MODEL_NAME) {
        config.llm.model = Some(v.to_string());
    }
    if let Some(v) = get(DALL_E_MODEL_NAME) {
        config.image.model = Some(v.to_string());
    }
    if let Some(v) = get(IMAGE_API_VERSION) {
        config.image.api_version = v.to_string();
    }
    if let Some(v) = get(BING_SEARCH_API_KEY) {
        config.search.subscription_key = Some(v.to_string());
    }
    if let Some(v) = get(BING_SEARCH_API_ENDPOINT) {
        config.search.endpoint = Some(v.to_string());
    }
    if let Some(v) = get("CONFAB_BIND") {
        config.server.bind_address = v.to_string();
    }
    if let Some(port) = get("CONFAB_PORT").and_then(|v| parse_or_warn("CONFAB_PORT", v)) {
        config.server.port = port;
    }
    if let Some(v) = get("CONFAB_LOG_LEVEL") {
        config.logging.level = v.to_string();
    }
    if let Some(v) = get("CONFAB_LOG_DIR") {
        config.logging.dir = Some(v.to_string());
    }
    if let Some(v) = get("CONFAB_WORK_DIR") {
        config.sandbox.work_dir = v.to_string();
    }
    if let Some(v) = get("CONFAB_USE_DOCKER") {
        config.sandbox.use_docker = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Some(v) = get("CONFAB_SANDBOX_IMAGE") {
        config.sandbox.image = v.to_string();
    }
    if let Some(secs) = get("CONFAB_SANDBOX_TIMEOUT_SECS")
        .and_then(|v| parse_or_warn("CONFAB_SANDBOX_TIMEOUT_SECS", v))
    {
        config.sandbox.timeout_secs = secs;
    }
    if let Some(v) = get("CONFAB_SUMMARY_PATH") {
        config.session.summary_path = v.to_string();
    }
    if let Some(v) = get("CONFAB_ANALYSIS_PATH") {
        config.session.analysis_path = v.to_string();
    }
    config
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = key, value = raw, "Ignoring unparseable environment value");
            None
        }
    }
}
