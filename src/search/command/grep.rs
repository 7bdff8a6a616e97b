//! grep argument construction for the fallback backend
//!
//! grep has no structured output, no ignore-file support and no brace
//! expansion in `--include`. Capabilities with no equivalent are either
//! rejected or dropped with a warning, never silently ignored.

use std::path::{Component, Path};

use super::{Platform, SearchCommand};
use crate::SearchError;
use crate::search::types::{CaseMode, OutputMode, PatternMode, SearchQuery};

/// Globs for the `fileType` names the fallback understands
const TYPE_GLOBS: &[(&str, &[&str])] = &[
    ("c", &["*.c", "*.h"]),
    ("cpp", &["*.cpp", "*.cc", "*.cxx", "*.hpp", "*.hh", "*.hxx", "*.h"]),
    ("cs", &["*.cs"]),
    ("css", &["*.css", "*.scss"]),
    ("go", &["*.go"]),
    ("html", &["*.html", "*.htm"]),
    ("java", &["*.java"]),
    ("js", &["*.js", "*.jsx", "*.mjs", "*.cjs"]),
    ("json", &["*.json"]),
    ("kotlin", &["*.kt", "*.kts"]),
    ("md", &["*.md", "*.markdown"]),
    ("php", &["*.php"]),
    ("py", &["*.py", "*.pyi"]),
    ("rb", &["*.rb"]),
    ("rust", &["*.rs"]),
    ("sh", &["*.sh", "*.bash", "*.zsh"]),
    ("sql", &["*.sql"]),
    ("swift", &["*.swift"]),
    ("toml", &["*.toml"]),
    ("ts", &["*.ts", "*.tsx", "*.mts", "*.cts"]),
    ("xml", &["*.xml"]),
    ("yaml", &["*.yaml", "*.yml"]),
];

/// Include globs for a ripgrep-style type name
#[must_use]
pub fn type_globs(file_type: &str) -> Option<&'static [&'static str]> {
    TYPE_GLOBS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(file_type))
        .map(|(_, globs)| *globs)
}

fn has_hidden_component(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Whether hidden entries are dropped after the run rather than by grep
///
/// GNU grep matches `--exclude`/`--exclude-dir` against the command-line
/// operand too, so `--exclude-dir=.*` on a root such as `~/.config/nvim`
/// excludes the root itself.
#[must_use]
pub fn filters_hidden_in_process(query: &SearchQuery) -> bool {
    !query.hidden && has_hidden_component(Path::new(&query.path))
}

/// True when `path` has a dot-prefixed component below `root`
#[must_use]
pub fn is_hidden_below(root: &str, path: &str) -> bool {
    Path::new(path)
        .strip_prefix(root)
        .is_ok_and(has_hidden_component)
}

fn unsupported(feature: &str, program: &str) -> SearchError {
    SearchError::FeatureRequiresPrimary {
        feature: feature.to_string(),
        primary: "rg".to_string(),
        fallback: program.to_string(),
    }
}

/// Translate a normalized query into grep arguments
///
/// # Errors
/// `FeatureRequiresPrimary` for multiline matching, PCRE without GNU grep,
/// and file types missing from the built-in table.
pub fn build(
    query: &SearchQuery,
    program: &str,
    platform: Platform,
) -> Result<SearchCommand, SearchError> {
    if query.multiline {
        return Err(unsupported("multiline", program));
    }
    if query.pattern_mode() == PatternMode::PerlRegex && !platform.has_gnu_grep() {
        return Err(unsupported("perlRegex", program));
    }
    let type_includes: &[&str] = match &query.file_type {
        Some(name) => type_globs(name)
            .ok_or_else(|| unsupported(&format!("fileType={name}"), program))?,
        None => &[],
    };

    let mut cmd = SearchCommand::new(program);

    cmd.arg(if query.follow_symlinks { "-R" } else { "-r" });
    cmd.arg("-H").arg("-I");
    if platform.is_bsd() {
        // BSD grep reads -Z as --decompress
        cmd.arg("--null");
    } else {
        cmd.arg("-Z");
    }

    match query.output_mode() {
        OutputMode::Normal => {
            cmd.arg("-n").arg("-b");
            if platform.is_bsd() {
                cmd.warn("BSD grep reports byte offsets of the match rather than the line start");
            }
        }
        OutputMode::FilesOnly => {
            cmd.arg("-l");
        }
        OutputMode::FilesWithoutMatch => {
            cmd.arg("-L");
        }
        OutputMode::Count => {
            cmd.arg("-c");
            cmd.warn("Fallback counts matching lines, not individual matches");
        }
    }

    match query.pattern_mode() {
        PatternMode::FixedString => {
            cmd.arg("-F");
        }
        PatternMode::PerlRegex => {
            cmd.arg("-P");
        }
        PatternMode::Regex => {
            cmd.arg("-E");
        }
    }

    match query.case_mode() {
        CaseMode::Insensitive => {
            cmd.arg("-i");
        }
        CaseMode::Smart => {
            if !query.pattern.chars().any(char::is_uppercase) {
                cmd.arg("-i");
            }
        }
        CaseMode::Sensitive => {}
    }

    if query.whole_word {
        cmd.arg("-w");
    }
    if query.invert_match {
        cmd.arg("-v");
    }

    for glob in query.include.iter().map(String::as_str).chain(type_includes.iter().copied()) {
        cmd.arg(format!("--include={glob}"));
    }
    for glob in &query.exclude {
        cmd.arg(format!("--exclude={glob}"));
    }
    for dir in &query.exclude_dir {
        let dir = dir.trim_end_matches('/');
        if dir.contains('/') {
            cmd.warn(format!(
                "grep matches excluded directories by name only; `{dir}` is applied to its last component"
            ));
        }
        let name = dir.rsplit('/').next().unwrap_or(dir);
        cmd.arg(format!("--exclude-dir={name}"));
    }
    if !query.hidden && !filters_hidden_in_process(query) {
        cmd.arg("--exclude=.*").arg("--exclude-dir=.*");
    }

    if query.output_mode() == OutputMode::Normal {
        let (before, after) = query.context_window();
        if before > 0 {
            cmd.arg(format!("-B{before}"));
        }
        if after > 0 {
            cmd.arg(format!("-A{after}"));
        }
    }

    if let Some(max) = query.max_matches_per_file {
        cmd.arg(format!("-m{max}"));
    }

    if query.max_depth.is_some() {
        cmd.warn("maxDepth is not supported by the grep fallback and was ignored");
    }
    if query.max_filesize.is_some() {
        cmd.warn("maxFilesize is not supported by the grep fallback and was ignored");
    }
    if !query.no_ignore {
        cmd.warn(".gitignore rules are not applied by the grep fallback");
    }

    cmd.arg("-e").arg(query.pattern.as_str());
    cmd.arg("--").arg(query.path.as_str());
    Ok(cmd)
}
