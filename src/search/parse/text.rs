//! Line-oriented output: path lists, per-file counts and grep match lines

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};

use super::{HitsBuilder, ParsedOutput, RawMatch, SkipReason, strip_terminator};
use crate::search::types::{CaseMode, PatternMode, SearchQuery};

/// Parse a newline- or NUL-separated path list, dropping duplicates
#[must_use]
pub fn parse_path_list(stdout: &[u8]) -> ParsedOutput {
    let mut builder = HitsBuilder::default();
    let mut seen = HashSet::new();

    for raw in stdout.split(|&b| b == b'\n' || b == b'\0') {
        let path = String::from_utf8_lossy(raw);
        let path = path.trim_end_matches('\r');
        if path.is_empty() || !seen.insert(path.to_string()) {
            continue;
        }
        builder.file(path);
    }

    builder.finish()
}

/// Parse `path\0count` lines; files with a zero count are dropped
#[must_use]
pub fn parse_counts(stdout: &[u8]) -> ParsedOutput {
    let mut builder = HitsBuilder::default();

    for line in stdout.split(|&b| b == b'\n') {
        match decode_count(line) {
            Ok((_, 0)) => {}
            Ok((path, count)) => builder.file(&path).count = Some(count),
            Err(reason) => builder.skip(&reason),
        }
    }

    builder.finish()
}

fn decode_count(line: &[u8]) -> Result<(String, usize), SkipReason> {
    if line.is_empty() {
        return Err(SkipReason::Blank);
    }
    let (path, rest) = split_nul(line)?;
    let count = strip_terminator(&String::from_utf8_lossy(rest))
        .trim()
        .parse()
        .map_err(|_| SkipReason::Malformed("count is not a number".to_string()))?;
    Ok((path, count))
}

fn split_nul(line: &[u8]) -> Result<(String, &[u8]), SkipReason> {
    let nul = line
        .iter()
        .position(|&b| b == b'\0')
        .ok_or_else(|| SkipReason::Malformed("missing NUL after path".to_string()))?;
    let path = String::from_utf8_lossy(&line[..nul]).into_owned();
    if path.is_empty() {
        return Err(SkipReason::MissingPath);
    }
    Ok((path, &line[nul + 1..]))
}

/// Locates match spans inside grep output lines, which carry none
#[derive(Debug, Clone)]
pub struct ColumnLocator {
    regex: Option<Regex>,
    invert: bool,
}

impl ColumnLocator {
    /// Compile an in-process equivalent of the query pattern
    ///
    /// When the pattern does not compile under Rust regex syntax (PCRE
    /// lookaround, backreferences) spans fall back to the whole line.
    #[must_use]
    pub fn for_query(query: &SearchQuery) -> Self {
        let source = match query.pattern_mode() {
            PatternMode::FixedString => regex::escape(&query.pattern),
            PatternMode::Regex | PatternMode::PerlRegex => query.pattern.clone(),
        };
        let source = if query.whole_word {
            format!(r"\b(?:{source})\b")
        } else {
            source
        };
        let insensitive = match query.case_mode() {
            CaseMode::Insensitive => true,
            CaseMode::Sensitive => false,
            CaseMode::Smart => !query.pattern.chars().any(char::is_uppercase),
        };

        let regex = match RegexBuilder::new(&source)
            .case_insensitive(insensitive)
            .multi_line(true)
            .build()
        {
            Ok(regex) => Some(regex),
            Err(e) => {
                log::debug!("Fallback column location disabled, pattern does not compile: {e}");
                None
            }
        };

        Self {
            regex,
            invert: query.invert_match,
        }
    }

    /// Whole-line spans only
    #[must_use]
    pub fn whole_line() -> Self {
        Self {
            regex: None,
            invert: false,
        }
    }

    fn locate(&self, line_number: u64, line_offset: u64, text: &str) -> Vec<RawMatch> {
        let whole = || {
            vec![RawMatch {
                line_number,
                line_offset,
                column: 0,
                match_length: text.len() as u64,
                line_text: text.to_string(),
            }]
        };

        let Some(regex) = self.regex.as_ref().filter(|_| !self.invert) else {
            return whole();
        };

        let spans: Vec<RawMatch> = regex
            .find_iter(text)
            .filter(|m| !m.is_empty())
            .map(|m| RawMatch {
                line_number,
                line_offset,
                column: m.start() as u64,
                match_length: m.len() as u64,
                line_text: text.to_string(),
            })
            .collect();

        if spans.is_empty() { whole() } else { spans }
    }
}

/// One line of `grep -Z -n -b -H` output
#[derive(Debug, Clone, PartialEq, Eq)]
struct GrepLine {
    path: String,
    line_number: u64,
    line_offset: u64,
    is_match: bool,
    text: String,
}

fn decode_grep_line(line: &[u8]) -> Result<GrepLine, SkipReason> {
    if line.is_empty() {
        return Err(SkipReason::Blank);
    }
    if line == b"--" {
        return Err(SkipReason::Separator);
    }

    let (path, rest) = split_nul(line)?;
    let rest = String::from_utf8_lossy(rest);

    // LINE:OFFSET:text for matches, LINE-OFFSET-text for context
    let digits = rest.find(|c: char| !c.is_ascii_digit()).ok_or_else(|| {
        SkipReason::Malformed("missing line number separator".to_string())
    })?;
    let line_number: u64 = rest[..digits]
        .parse()
        .map_err(|_| SkipReason::Malformed("invalid line number".to_string()))?;
    let sep = rest[digits..]
        .chars()
        .next()
        .ok_or_else(|| SkipReason::Malformed("truncated line".to_string()))?;
    let is_match = match sep {
        ':' => true,
        '-' => false,
        other => return Err(SkipReason::Malformed(format!("unexpected separator {other:?}"))),
    };

    let after_line = &rest[digits + 1..];
    let offset_end = after_line
        .find(sep)
        .ok_or_else(|| SkipReason::Malformed("missing byte offset".to_string()))?;
    let line_offset: u64 = after_line[..offset_end]
        .parse()
        .map_err(|_| SkipReason::Malformed("invalid byte offset".to_string()))?;
    let text = strip_terminator(&after_line[offset_end + 1..]).to_string();

    Ok(GrepLine {
        path,
        line_number,
        line_offset,
        is_match,
        text,
    })
}

/// Parse grep's normal-mode output into per-file hits
#[must_use]
pub fn parse_grep_lines(stdout: &[u8], locator: &ColumnLocator) -> ParsedOutput {
    let mut builder = HitsBuilder::default();

    for line in stdout.split(|&b| b == b'\n') {
        match decode_grep_line(line) {
            Ok(hit) if hit.is_match => {
                let matches = locator.locate(hit.line_number, hit.line_offset, &hit.text);
                builder.add_match(&hit.path, hit.line_number, hit.text, matches);
            }
            Ok(hit) => builder.add_context(&hit.path, hit.line_number, hit.text),
            Err(reason) => builder.skip(&reason),
        }
    }

    builder.finish()
}
