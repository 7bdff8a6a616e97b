//! Pattern construction from user-controlled fragments

/// Escape every regex metacharacter in `text`
///
/// The result matches `text` literally under both ripgrep's Rust regex
/// syntax and POSIX extended regular expressions.
#[must_use]
pub fn escape_regex(text: &str) -> String {
    regex::escape(text)
}

/// Pattern matching a call to `symbol`, e.g. `foo (` or `foo(`
#[must_use]
pub fn call_site_pattern(symbol: &str) -> String {
    format!(r"\b{}\s*\(", escape_regex(symbol))
}
