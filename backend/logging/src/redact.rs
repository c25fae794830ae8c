//! Log Redaction Layer
//!
//! Scrubs API keys, subscription keys, and bearer tokens from strings prior to logging.

use regex::Regex;
use std::sync::LazyLock;

static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)bearer\s+[a-zA-Z0-9\-\._~+/]+=*").unwrap());
static SK_KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"sk-[a-zA-Z0-9]{20,}").unwrap());
static HEADER_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(ocp-apim-subscription-key|api-key)("?\s*[:=]\s*"?)[^\s",}]+"#).unwrap()
});

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = BEARER_RE.replace_all(input, "Bearer [REDACTED_TOKEN]");
    let redacted = SK_KEY_RE.replace_all(&redacted, "[REDACTED_TOKEN]");
    HEADER_KEY_RE
        .replace_all(&redacted, "${1}${2}[REDACTED_KEY]")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_redaction() {
        let raw = "Sending with Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("eyJhbGci"));
        assert!(clean.contains("[REDACTED_TOKEN]"));
    }

    #[test]
    fn test_subscription_key_redaction() {
        let clean = redact_sensitive_data(r#"{"Ocp-Apim-Subscription-Key": "0123456789abcdef"}"#);
        assert!(!clean.contains("0123456789abcdef"));
        assert!(clean.contains("[REDACTED_KEY]"));
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(redact_sensitive_data("What is (2+3)*4?"), "What is (2+3)*4?");
    }
}
