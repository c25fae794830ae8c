//! Fenced code block extraction from agent messages.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*([\w+-]*)[ \t]*\r?\n(.*?)\r?\n[ \t]*```").unwrap()
});

static FILENAME_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#\s*filename:\s*(\S+)\s*$").unwrap());

/// First words that mark an untagged block as a shell script.
const SHELL_LEADERS: &[&str] = &[
    "apt", "apt-get", "bash", "cat", "cd", "echo", "export", "ls", "mkdir", "pip", "pip3", "sh",
    "python", "python3",
];

/// One fenced block, tagged with its (lowercased) language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
    /// Name requested by a `# filename: <name>` first line.
    pub filename: Option<String>,
}

impl CodeBlock {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        let code = code.into();
        let filename = code
            .lines()
            .next()
            .and_then(|first| FILENAME_HINT.captures(first))
            .map(|caps| caps[1].to_string());
        Self {
            language: language.into().to_ascii_lowercase(),
            code,
            filename,
        }
    }
}

/// Extract every fenced block in order. Untagged blocks are treated as shell
/// when they start with a common command and as python otherwise.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    FENCE
        .captures_iter(text)
        .map(|caps| {
            let code = caps[2].to_string();
            let language = match &caps[1] {
                "" => infer_language(&code),
                tag => tag,
            };
            CodeBlock::new(language, code)
        })
        .collect()
}

fn infer_language(code: &str) -> &'static str {
    let first_word = code.split_whitespace().next().unwrap_or("");
    if SHELL_LEADERS.contains(&first_word) {
        "sh"
    } else {
        "python"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_tagged_blocks_in_order() {
        let text = "Run this:\n```python\nprint(1)\n```\nthen\n```sh\necho hi\n```\nTERMINATE";
        let blocks = extract_code_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].language, "python");
        assert_eq!(blocks[0].code, "print(1)");
        assert_eq!(blocks[1].language, "sh");
        assert_eq!(blocks[1].code, "echo hi");
    }

    #[test]
    fn test_filename_hint() {
        let text = "```python\n# filename: plot.py\nimport math\nprint(math.pi)\n```";
        let blocks = extract_code_blocks(text);
        assert_eq!(blocks[0].filename.as_deref(), Some("plot.py"));
        assert!(blocks[0].code.starts_with("# filename: plot.py"));
    }

    #[test]
    fn test_untagged_language_inference() {
        let blocks = extract_code_blocks("```\npip install yfinance\n```\n```\nx = 1\n```");
        assert_eq!(blocks[0].language, "sh");
        assert_eq!(blocks[1].language, "python");
    }

    #[test]
    fn test_language_is_lowercased() {
        let blocks = extract_code_blocks("```Python\nprint(2)\n```");
        assert_eq!(blocks[0].language, "python");
    }

    #[test]
    fn test_no_blocks() {
        assert!(extract_code_blocks("Just words. TERMINATE").is_empty());
        assert!(extract_code_blocks("```python\nunclosed").is_empty());
    }
}
