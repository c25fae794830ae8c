//! Default values for every configuration knob.

pub const DEFAULT_API_VERSION: &str = "2024-02-01";
pub const DEFAULT_IMAGE_API_VERSION: &str = "2024-02-01";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_CACHE_SEED: u64 = 42;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_SANDBOX_IMAGE: &str = "python:3-slim";
pub const DEFAULT_WORK_DIR: &str = "coder_output";
pub const DEFAULT_SANDBOX_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8501;
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_SUMMARY_PATH: &str = "docs/chat_summary.txt";
pub const DEFAULT_ANALYSIS_PATH: &str = "docs/final_analysis.md";

/// Config file looked up in the working directory when `CONFAB_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "confab.yaml";
