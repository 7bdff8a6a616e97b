//! Context stitching and code-point-safe truncation

use super::parse::{FileHits, RawMatch};
use super::types::{Match, MatchLocation};

const ELLIPSIS: &str = "...";

/// Join before-context, the match line and after-context into one value
///
/// Missing context lines (file edges, lines the backend did not emit) are
/// skipped rather than rendered as blanks.
#[must_use]
pub fn stitch(hits: &FileHits, raw: &RawMatch, before: u32, after: u32) -> String {
    let line = raw.line_number;
    let first = line.saturating_sub(u64::from(before)).max(1);
    let last = line.saturating_add(u64::from(after));

    let mut parts: Vec<&str> = Vec::new();
    for n in first..line {
        if let Some(text) = hits.context.get(&n) {
            parts.push(text);
        }
    }
    parts.push(&raw.line_text);
    for n in line + 1..=last {
        if let Some(text) = hits.context.get(&n) {
            parts.push(text);
        }
    }

    parts.join("\n")
}

/// Truncate to at most `max_chars` Unicode scalar values
///
/// When truncation happens the value is cut to `max_chars - 3` code points
/// followed by `...`. Budgets of three or fewer skip the ellipsis.
#[must_use]
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    if max_chars <= ELLIPSIS.len() {
        return value.chars().take(max_chars).collect();
    }
    let mut out: String = value.chars().take(max_chars - ELLIPSIS.len()).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Build the externally visible match
#[must_use]
pub fn to_match(
    hits: &FileHits,
    raw: &RawMatch,
    before: u32,
    after: u32,
    max_chars: usize,
) -> Match {
    let value = stitch(hits, raw, before, after);
    Match {
        value: truncate_chars(trim_line_end(&value), max_chars),
        location: MatchLocation {
            byte_offset: raw.line_offset + raw.column,
            byte_length: raw.match_length,
        },
        line: raw.line_number,
        column: raw.column,
    }
}

fn trim_line_end(value: &str) -> &str {
    value.trim_end_matches(['\n', '\r'])
}
