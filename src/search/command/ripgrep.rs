//! ripgrep argument construction

use super::{SearchCommand, globs};
use crate::search::types::{CaseMode, OutputMode, PatternMode, SearchQuery};

/// Translate a normalized query into ripgrep arguments
#[must_use]
pub fn build(query: &SearchQuery, program: &str) -> SearchCommand {
    let mut cmd = SearchCommand::new(program);

    match query.output_mode() {
        OutputMode::Normal => {
            cmd.arg("--json");
        }
        OutputMode::FilesOnly => {
            cmd.arg("--files-with-matches").arg("--null");
        }
        OutputMode::FilesWithoutMatch => {
            cmd.arg("--files-without-match").arg("--null");
        }
        OutputMode::Count => {
            cmd.arg("--count-matches").arg("--null").arg("--with-filename");
        }
    }

    match query.case_mode() {
        CaseMode::Insensitive => {
            cmd.arg("--ignore-case");
        }
        CaseMode::Smart => {
            cmd.arg("--smart-case");
        }
        CaseMode::Sensitive if query.case_sensitive => {
            cmd.arg("--case-sensitive");
        }
        CaseMode::Sensitive => {}
    }

    match query.pattern_mode() {
        PatternMode::FixedString => {
            cmd.arg("--fixed-strings");
        }
        PatternMode::PerlRegex => {
            cmd.arg("--pcre2");
        }
        PatternMode::Regex => {}
    }

    if query.whole_word {
        cmd.arg("--word-regexp");
    }
    if query.invert_match {
        cmd.arg("--invert-match");
    }
    if query.multiline {
        cmd.arg("--multiline");
    }

    for glob in globs::consolidate(&query.include) {
        cmd.arg_pair("--glob", glob);
    }
    for glob in &query.exclude {
        cmd.arg_pair("--glob", format!("!{glob}"));
    }
    for dir in &query.exclude_dir {
        cmd.arg_pair("--glob", format!("!{}/", dir.trim_end_matches('/')));
    }
    if let Some(file_type) = &query.file_type {
        cmd.arg_pair("--type", file_type);
    }

    if query.output_mode() == OutputMode::Normal {
        match query.context_window() {
            (0, 0) => {}
            (before, after) if before == after => {
                cmd.arg_pair("--context", before);
            }
            (before, after) => {
                if before > 0 {
                    cmd.arg_pair("--before-context", before);
                }
                if after > 0 {
                    cmd.arg_pair("--after-context", after);
                }
            }
        }
    }

    if let Some(max) = query.max_matches_per_file {
        cmd.arg_pair("--max-count", max);
    }

    if query.hidden {
        cmd.arg("--hidden");
    }
    if query.no_ignore {
        cmd.arg("--no-ignore");
    }
    if query.follow_symlinks {
        cmd.arg("--follow");
    }
    if let Some(depth) = query.max_depth {
        cmd.arg_pair("--max-depth", depth);
    }
    if let Some(size) = &query.max_filesize {
        cmd.arg_pair("--max-filesize", size);
    }

    cmd.arg("--regexp").arg(query.pattern.as_str());
    cmd.arg("--").arg(query.path.as_str());
    cmd
}
