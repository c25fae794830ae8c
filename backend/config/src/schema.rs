//! Confab configuration schema.
//!
//! Every section deserializes from YAML/JSON with camelCase keys and falls back
//! to defaults field by field, so partial files are fine.

use serde::{Deserialize, Serialize};

use crate::defaults::*;

/// Root configuration, immutable after process start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub image: ImageConfig,
    pub search: SearchConfig,
    pub sandbox: SandboxConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub session: SessionConfig,
}

/// Chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com/`.
    pub base_url: Option<String>,
    /// Deployment (model) name.
    pub model: Option<String>,
    pub api_version: String,
    /// When unset, an Entra ID token is used instead.
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Sent to the endpoint as the sampling seed.
    pub cache_seed: Option<u64>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            api_key: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            cache_seed: Some(DEFAULT_CACHE_SEED),
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
        }
    }
}

/// Image generation endpoint. Shares the chat endpoint's base URL and credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageConfig {
    pub model: Option<String>,
    pub api_version: String,
    /// Overrides `llm.baseUrl` when set.
    pub base_url: Option<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: None,
            api_version: DEFAULT_IMAGE_API_VERSION.to_string(),
            base_url: None,
        }
    }
}

/// Web search endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    pub subscription_key: Option<String>,
    pub endpoint: Option<String>,
}

/// Sandboxed code execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SandboxConfig {
    pub use_docker: bool,
    pub image: String,
    pub work_dir: String,
    pub timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            use_docker: true,
            image: DEFAULT_SANDBOX_IMAGE.to_string(),
            work_dir: DEFAULT_WORK_DIR.to_string(),
            timeout_secs: DEFAULT_SANDBOX_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for rolling JSON logs; console only when unset.
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            dir: None,
        }
    }
}

/// Where the transcript summary and its analysis land.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub summary_path: String,
    pub analysis_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            summary_path: DEFAULT_SUMMARY_PATH.to_string(),
            analysis_path: DEFAULT_ANALYSIS_PATH.to_string(),
        }
    }
}

impl ImageConfig {
    /// Effective base URL: the image override, else the chat endpoint.
    pub fn effective_base_url<'a>(&'a self, llm: &'a LlmConfig) -> Option<&'a str> {
        self.base_url.as_deref().or(llm.base_url.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "llm:\n  model: gpt-4o-mini\n  temperature: 0.0\nsandbox:\n  useDocker: false\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.llm.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.llm.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(!config.sandbox.use_docker);
        assert_eq!(config.sandbox.timeout_secs, DEFAULT_SANDBOX_TIMEOUT_SECS);
    }

    #[test]
    fn test_image_base_url_falls_back_to_llm() {
        let mut config = AppConfig::default();
        config.llm.base_url = Some("https://chat.example".into());
        assert_eq!(
            config.image.effective_base_url(&config.llm),
            Some("https://chat.example")
        );
        config.image.base_url = Some("https://img.example".into());
        assert_eq!(
            config.image.effective_base_url(&config.llm),
            Some("https://img.example")
        );
    }
}
