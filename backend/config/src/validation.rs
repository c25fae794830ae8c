//! Config validation.
//!
//! Missing endpoints are reported as warnings only: absence surfaces later as a
//! request or authentication failure at first use. Errors are reserved for
//! values that can never work.

use crate::env;
use crate::schema::AppConfig;
use thiserror::Error;

/// A config finding with field path and message.
#[derive(Debug, Error)]
#[error("Config validation issue at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &AppConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    if config.llm.base_url.is_none() {
        report.warn("llm.baseUrl", format!("not set ({}); chat requests will fail", env::AOAI_API_BASE));
    }
    if config.llm.model.is_none() {
        report.warn("llm.model", format!("not set ({}); chat requests will fail", env::CHAT_MODEL_NAME));
    }
    if config.image.model.is_none() {
        report.warn("image.model", format!("not set ({}); image generation will fail", env::DALL_E_MODEL_NAME));
    }
    if config.search.endpoint.is_none() || config.search.subscription_key.is_none() {
        report.warn(
            "search",
            format!(
                "{} / {} not set; web search will fail",
                env::BING_SEARCH_API_ENDPOINT,
                env::BING_SEARCH_API_KEY
            ),
        );
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        report.error("llm.temperature", "must be between 0.0 and 2.0");
    }
    if config.llm.max_tokens == 0 {
        report.error("llm.maxTokens", "must be greater than 0");
    }
    if config.sandbox.timeout_secs == 0 {
        report.error("sandbox.timeoutSecs", "must be greater than 0");
    }
    report
}
