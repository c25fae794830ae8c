/// Literal token that ends a multi-turn exchange.
pub const TERMINATION_MARKER: &str = "TERMINATE";

/// Whether a message's content ends the exchange: the trimmed text ends with
/// the marker. Missing or empty content never terminates.
pub fn is_termination_msg(content: Option<&str>) -> bool {
    TerminationPolicy::EndsWithMarker.is_terminal(content)
}

/// How an agent recognizes the end of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminationPolicy {
    #[default]
    EndsWithMarker,
    /// The marker appears anywhere in the content.
    ContainsMarker,
}

impl TerminationPolicy {
    pub fn is_terminal(self, content: Option<&str>) -> bool {
        let Some(text) = content.map(str::trim).filter(|t| !t.is_empty()) else {
            return false;
        };
        match self {
            TerminationPolicy::EndsWithMarker => text.ends_with(TERMINATION_MARKER),
            TerminationPolicy::ContainsMarker => text.contains(TERMINATION_MARKER),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_marker() {
        assert!(is_termination_msg(Some("The answer is 20. TERMINATE")));
        assert!(is_termination_msg(Some("TERMINATE\n\n  ")));
        assert!(is_termination_msg(Some("done.TERMINATE")));
    }

    #[test]
    fn test_non_terminal() {
        assert!(!is_termination_msg(None));
        assert!(!is_termination_msg(Some("")));
        assert!(!is_termination_msg(Some("   ")));
        assert!(!is_termination_msg(Some("TERMINATE once more, then stop")));
        assert!(!is_termination_msg(Some("terminate")));
    }

    #[test]
    fn test_contains_policy() {
        let policy = TerminationPolicy::ContainsMarker;
        assert!(policy.is_terminal(Some("TERMINATE once more, then stop")));
        assert!(!policy.is_terminal(None));
        assert!(!policy.is_terminal(Some("keep going")));
    }
}
