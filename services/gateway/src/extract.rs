//! Terminal code extraction from a completed response
//!
//! Only the first fenced block of each language is taken. Absence of a
//! block yields an empty string; extraction never fails.

use common::GeneratedCode;
use regex::Regex;
use std::sync::OnceLock;

/// Extract the first `tsx` and the first `css` fenced blocks
pub fn extract_code(response: &str) -> GeneratedCode {
    static TSX_REGEX: OnceLock<Regex> = OnceLock::new();
    static CSS_REGEX: OnceLock<Regex> = OnceLock::new();

    let tsx = TSX_REGEX.get_or_init(|| fenced_block("tsx"));
    let css = CSS_REGEX.get_or_init(|| fenced_block("css"));

    GeneratedCode {
        tsx: first_block(tsx, response),
        css: first_block(css, response),
    }
}

fn fenced_block(language: &str) -> Regex {
    // Opening fence, optional trailing blanks, newline; lazy body; newline before the closing fence
    Regex::new(&format!(r"(?s)```{}[^\S\n]*\n(.*?)\n```", regex::escape(language)))
        .expect("Failed to compile fenced block regex")
}

fn first_block(regex: &Regex, response: &str) -> String {
    regex
        .captures(response)
        .and_then(|captures| captures.get(1))
        .map(|body| body.as_str().trim().to_string())
        .unwrap_or_default()
}
