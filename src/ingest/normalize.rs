//! Text normalization applied before chunking.
//!
//! Fenced code blocks are replaced with a placeholder token so code noise
//! does not dominate chunk content, while keeping a marker that a block
//! existed at that position.

use std::sync::OnceLock;

use regex::Regex;

const CODE_BLOCK_PLACEHOLDER: &str = "[CODE_BLOCK]";

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```[\s\S]*?```").expect("static regex"))
}

fn inline_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`\n]+)`").expect("static regex"))
}

fn spaces_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").expect("static regex"))
}

fn newline_padding_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" ?\n ?").expect("static regex"))
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("static regex"))
}

/// Normalize raw record text. Pure, never fails; empty input yields an
/// empty string.
///
/// Line endings become `\n`, fenced code blocks become `[CODE_BLOCK]`,
/// inline code loses its backticks, runs of spaces/tabs collapse to one
/// space, and 3+ consecutive newlines collapse to exactly two (paragraph
/// boundaries survive for the chunker).
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let text = fence_re().replace_all(&text, CODE_BLOCK_PLACEHOLDER);
    let text = inline_code_re().replace_all(&text, "[$1]");
    let text = spaces_re().replace_all(&text, " ");
    let text = newline_padding_re().replace_all(&text, "\n");
    let text = blank_lines_re().replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n\n  "), "");
    }

    #[test]
    fn collapses_space_runs() {
        assert_eq!(normalize("a    b\t\tc"), "a b c");
    }

    #[test]
    fn normalizes_line_endings() {
        assert_eq!(normalize("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn collapses_excess_blank_lines_but_keeps_paragraphs() {
        assert_eq!(normalize("one\n\n\n\ntwo"), "one\n\ntwo");
        assert_eq!(normalize("one\n\ntwo"), "one\n\ntwo");
    }

    #[test]
    fn replaces_fenced_code_blocks() {
        let out = normalize("before\n```rust\nlet x = 1;\n```\nafter");
        assert!(out.contains("[CODE_BLOCK]"));
        assert!(!out.contains("let x = 1;"));
    }

    #[test]
    fn unwraps_inline_code() {
        assert_eq!(normalize("run `cargo test` now"), "run [cargo test] now");
    }

    #[test]
    fn idempotent_on_normalized_text() {
        let once = normalize("Login  fails.\n\n\nRetry   is missing.");
        assert_eq!(normalize(&once), once);
    }
}
