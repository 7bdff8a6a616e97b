//! `find` argument construction for file listings

use super::time_window::FindAge;
use super::{Platform, SearchCommand};
use crate::SearchError;
use crate::search::types::{EntryType, FileListQuery};

/// Sizes in find syntax: digits with an optional c/k/M/G suffix
fn validate_size(field: &str, size: &str) -> Result<(), SearchError> {
    let digits = size.trim_end_matches(['c', 'k', 'M', 'G']);
    let suffix_len = size.len() - digits.len();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) || suffix_len > 1 {
        return Err(SearchError::InvalidQuery {
            reason: format!("{field} `{size}` is not a find size such as 10k or 2M"),
        });
    }
    Ok(())
}

/// Translate a listing query into `find` arguments
///
/// Minimum depth is applied by the caller after the walk so that pruning of
/// excluded and hidden directories also happens above that depth.
///
/// # Errors
/// `InvalidQuery` for malformed time windows, sizes or a regex that fails to
/// compile.
pub fn build(
    query: &FileListQuery,
    program: &str,
    platform: Platform,
) -> Result<SearchCommand, SearchError> {
    let mut cmd = SearchCommand::new(program);

    if let Some(pattern) = &query.path_pattern {
        regex::Regex::new(pattern).map_err(|e| SearchError::InvalidQuery {
            reason: format!("invalid pathPattern: {e}"),
        })?;
        if platform.is_bsd() {
            cmd.arg("-E");
            cmd.warn("BSD find: `-regextype posix-extended` replaced by `-E`");
        }
    }

    cmd.arg(query.path.as_str());
    cmd.arg_pair("-mindepth", 1);
    if let Some(depth) = query.max_depth {
        cmd.arg_pair("-maxdepth", depth);
    }
    if query.path_pattern.is_some() && !platform.is_bsd() {
        cmd.arg_pair("-regextype", "posix-extended");
    }

    // Pruned names: excluded dirs anywhere, plus dotfiles unless requested
    let mut prune: Vec<Vec<String>> = query
        .exclude_dir
        .iter()
        .map(|dir| dir.trim_end_matches('/'))
        .filter(|dir| !dir.is_empty())
        .map(|dir| {
            let name = dir.rsplit('/').next().unwrap_or(dir);
            vec!["-type".into(), "d".into(), "-name".into(), name.to_string()]
        })
        .collect();
    if !query.include_hidden {
        prune.push(vec!["-name".into(), ".*".into()]);
    }
    if !prune.is_empty() {
        cmd.arg("(");
        for (i, clause) in prune.into_iter().enumerate() {
            if i > 0 {
                cmd.arg("-o");
            }
            cmd.args.extend(clause);
        }
        cmd.arg(")").arg("-prune").arg("-o");
    }

    match query.entry_type {
        EntryType::File => {
            cmd.arg_pair("-type", "f");
        }
        EntryType::Directory => {
            cmd.arg_pair("-type", "d");
        }
        EntryType::Symlink => {
            cmd.arg_pair("-type", "l");
        }
        EntryType::Any => {}
    }

    if let Some(name) = &query.name_pattern {
        let flag = if query.case_insensitive { "-iname" } else { "-name" };
        cmd.arg_pair(flag, name);
    }
    if let Some(pattern) = &query.path_pattern {
        let flag = if query.case_insensitive { "-iregex" } else { "-regex" };
        cmd.arg_pair(flag, pattern);
    }
    if let Some(window) = &query.modified_within {
        cmd.args.extend(FindAge::parse(window)?.find_args(true));
    }
    if let Some(window) = &query.modified_before {
        cmd.args.extend(FindAge::parse(window)?.find_args(false));
    }
    if let Some(size) = &query.size_greater {
        validate_size("sizeGreater", size)?;
        cmd.arg_pair("-size", format!("+{size}"));
    }
    if let Some(size) = &query.size_less {
        validate_size("sizeLess", size)?;
        cmd.arg_pair("-size", format!("-{size}"));
    }
    if query.empty_only {
        cmd.arg("-empty");
    }

    cmd.arg("-print0");
    Ok(cmd)
}
