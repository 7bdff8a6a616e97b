//! Ripgrep JSON Lines decoding
//!
//! Each line is decoded on its own. A line that is not valid JSON, or not a
//! known event, is skipped and counted; the remaining lines still produce
//! results.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use super::{HitsBuilder, ParsedOutput, RawMatch, SkipReason, SummaryStats, strip_terminator};

/// Root message type from ripgrep JSON output
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RipgrepMessage {
    Begin { data: PathOnly },
    Match { data: LineData },
    Context { data: LineData },
    End { data: PathOnly },
    Summary { data: SummaryData },
}

#[derive(Debug, Deserialize)]
struct PathOnly {
    path: Option<Data>,
}

#[derive(Debug, Deserialize)]
struct LineData {
    path: Option<Data>,
    lines: Data,
    line_number: Option<u64>,
    absolute_offset: u64,
    #[serde(default)]
    submatches: Vec<SubMatch>,
}

#[derive(Debug, Deserialize)]
struct SubMatch {
    start: u64,
    end: u64,
}

/// ripgrep's "arbitrary data": UTF-8 `text` or base64 `bytes`
#[derive(Debug, Deserialize)]
struct Data {
    text: Option<String>,
    bytes: Option<String>,
}

impl Data {
    fn decode(self) -> Result<String, SkipReason> {
        if let Some(text) = self.text {
            return Ok(text);
        }
        let bytes = self
            .bytes
            .ok_or_else(|| SkipReason::Malformed("data has neither text nor bytes".to_string()))?;
        let raw = STANDARD
            .decode(bytes)
            .map_err(|e| SkipReason::Malformed(format!("invalid base64: {e}")))?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

#[derive(Debug, Deserialize)]
struct SummaryData {
    stats: SummaryStats,
}

/// A successfully decoded output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Begin { path: String },
    Match {
        path: String,
        line_number: u64,
        text: String,
        matches: Vec<RawMatch>,
    },
    Context {
        path: String,
        line_number: u64,
        text: String,
    },
    End { path: String },
    Summary(SummaryStats),
}

/// Decode one JSON line
///
/// # Errors
/// Returns the reason the line carries nothing usable.
pub fn decode_line(line: &[u8]) -> Result<ParsedLine, SkipReason> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Err(SkipReason::Blank);
    }

    let message: RipgrepMessage =
        serde_json::from_slice(line).map_err(|e| SkipReason::Malformed(e.to_string()))?;

    match message {
        RipgrepMessage::Begin { data } => Ok(ParsedLine::Begin {
            path: require_path(data.path)?,
        }),
        RipgrepMessage::End { data } => Ok(ParsedLine::End {
            path: require_path(data.path)?,
        }),
        RipgrepMessage::Summary { data } => Ok(ParsedLine::Summary(data.stats)),
        RipgrepMessage::Context { data } => {
            let path = require_path(data.path)?;
            let line_number = data
                .line_number
                .ok_or_else(|| SkipReason::Malformed("context without line number".to_string()))?;
            let text = strip_terminator(&data.lines.decode()?).to_string();
            Ok(ParsedLine::Context {
                path,
                line_number,
                text,
            })
        }
        RipgrepMessage::Match { data } => {
            let path = require_path(data.path)?;
            let line_number = data
                .line_number
                .ok_or_else(|| SkipReason::Malformed("match without line number".to_string()))?;
            let text = strip_terminator(&data.lines.decode()?).to_string();

            let matches = if data.submatches.is_empty() {
                // Inverted matches carry no spans; report the whole line
                vec![RawMatch {
                    line_number,
                    line_offset: data.absolute_offset,
                    column: 0,
                    match_length: text.len() as u64,
                    line_text: text.clone(),
                }]
            } else {
                data.submatches
                    .iter()
                    .map(|sm| RawMatch {
                        line_number,
                        line_offset: data.absolute_offset,
                        column: sm.start,
                        match_length: sm.end.saturating_sub(sm.start),
                        line_text: text.clone(),
                    })
                    .collect()
            };

            Ok(ParsedLine::Match {
                path,
                line_number,
                text,
                matches,
            })
        }
    }
}

fn require_path(path: Option<Data>) -> Result<String, SkipReason> {
    path.ok_or(SkipReason::MissingPath)?.decode()
}

/// Decode a full ripgrep `--json` stdout buffer
#[must_use]
pub fn parse(stdout: &[u8]) -> ParsedOutput {
    let mut builder = HitsBuilder::default();

    for line in stdout.split(|&b| b == b'\n') {
        match decode_line(line) {
            Ok(ParsedLine::Begin { path }) => {
                builder.file(&path);
            }
            Ok(ParsedLine::Match {
                path,
                line_number,
                text,
                matches,
            }) => builder.add_match(&path, line_number, text, matches),
            Ok(ParsedLine::Context {
                path,
                line_number,
                text,
            }) => builder.add_context(&path, line_number, text),
            Ok(ParsedLine::End { .. }) => {}
            Ok(ParsedLine::Summary(stats)) => builder.set_summary(stats),
            Err(reason) => builder.skip(&reason),
        }
    }

    let mut out = builder.finish();
    // Files that only produced begin/context events have nothing to report
    out.files.retain(|f| !f.matches.is_empty());
    out
}
