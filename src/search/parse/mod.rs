//! Streaming decoders for backend output
//!
//! Both backends are reduced to the same intermediate form: a list of
//! `FileHits`, each carrying raw matches in line order plus a line-number
//! index of every line the backend printed for that file. Stitching resolves
//! before/after context through that index instead of re-reading files.

pub mod json;
pub mod text;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// One match span as reported by a backend. Never exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    /// 1-based
    pub line_number: u64,
    /// Absolute byte offset of the line start within the file
    pub line_offset: u64,
    /// Byte offset of the match within the line
    pub column: u64,
    /// Byte length of the match
    pub match_length: u64,
    /// Line text without its terminator
    pub line_text: String,
}

/// Everything parsed for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHits {
    pub path: String,
    pub matches: Vec<RawMatch>,
    /// Context entries keyed by line number; match lines are indexed too
    pub context: BTreeMap<u64, String>,
    /// Backend-reported count in count mode
    pub count: Option<usize>,
}

impl FileHits {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            matches: Vec::new(),
            context: BTreeMap::new(),
            count: None,
        }
    }

    /// Matches reported for this file before pagination
    #[must_use]
    pub fn match_count(&self) -> usize {
        self.count.unwrap_or(self.matches.len())
    }
}

/// Summary statistics emitted by the primary backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
pub struct SummaryStats {
    #[serde(default)]
    pub searches: u64,
    #[serde(default)]
    pub searches_with_match: u64,
    #[serde(default)]
    pub bytes_searched: u64,
    #[serde(default)]
    pub matched_lines: u64,
    #[serde(default)]
    pub matches: u64,
}

/// Why a single output line was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Blank,
    Malformed(String),
    MissingPath,
    Separator,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => f.write_str("blank line"),
            Self::Malformed(reason) => write!(f, "malformed: {reason}"),
            Self::MissingPath => f.write_str("event without a path"),
            Self::Separator => f.write_str("group separator"),
        }
    }
}

/// Result of decoding a whole output buffer
#[derive(Debug, Clone, Default)]
pub struct ParsedOutput {
    pub files: Vec<FileHits>,
    pub summary: Option<SummaryStats>,
    pub skipped: usize,
}

impl ParsedOutput {
    #[must_use]
    pub fn total_matches(&self) -> usize {
        self.files.iter().map(FileHits::match_count).sum()
    }
}

/// Accumulates per-file hits in first-seen order
#[derive(Debug, Default)]
pub(crate) struct HitsBuilder {
    files: Vec<FileHits>,
    index: HashMap<String, usize>,
    skipped: usize,
    summary: Option<SummaryStats>,
}

impl HitsBuilder {
    pub(crate) fn file(&mut self, path: &str) -> &mut FileHits {
        let idx = match self.index.get(path).copied() {
            Some(idx) => idx,
            None => {
                self.files.push(FileHits::new(path));
                self.index.insert(path.to_string(), self.files.len() - 1);
                self.files.len() - 1
            }
        };
        &mut self.files[idx]
    }

    pub(crate) fn add_match(&mut self, path: &str, line_number: u64, text: String, matches: Vec<RawMatch>) {
        let file = self.file(path);
        file.matches.extend(matches);
        file.context.insert(line_number, text);
    }

    pub(crate) fn add_context(&mut self, path: &str, line_number: u64, text: String) {
        self.file(path).context.entry(line_number).or_insert(text);
    }

    pub(crate) fn skip(&mut self, reason: &SkipReason) {
        if *reason != SkipReason::Blank && *reason != SkipReason::Separator {
            log::debug!("Skipping backend output line: {reason}");
            self.skipped += 1;
        }
    }

    pub(crate) fn set_summary(&mut self, stats: SummaryStats) {
        self.summary = Some(stats);
    }

    pub(crate) fn finish(mut self) -> ParsedOutput {
        for file in &mut self.files {
            file.matches
                .sort_by_key(|m| (m.line_number, m.column));
        }
        if self.skipped > 0 {
            log::warn!("Skipped {} malformed backend output lines", self.skipped);
        }
        if let Some(stats) = &self.summary {
            log::debug!(
                "Backend summary: {} files searched, {} with matches, {} matches, {} bytes",
                stats.searches,
                stats.searches_with_match,
                stats.matches,
                stats.bytes_searched
            );
        }
        ParsedOutput {
            files: self.files,
            summary: self.summary,
            skipped: self.skipped,
        }
    }
}

/// Strip one trailing `\n` or `\r\n`
pub(crate) fn strip_terminator(text: &str) -> &str {
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.strip_suffix('\r').unwrap_or(text)
}
