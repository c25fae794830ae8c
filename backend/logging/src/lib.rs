//! Structured logging for Confab.
//!
//! Console output, optional rolling JSON files, and redaction of credentials
//! from strings before they reach a log line.

pub mod logger;
pub mod redact;

pub use logger::init_logger;
pub use redact::redact_sensitive_data;
