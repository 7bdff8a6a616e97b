//! Include-glob handling

use globset::Glob;

use crate::SearchError;

/// Reject globs that neither backend could interpret
///
/// # Errors
/// `InvalidQuery` naming the first glob that fails to parse.
pub fn validate(globs: &[String]) -> Result<(), SearchError> {
    for glob in globs {
        if glob.trim().is_empty() {
            return Err(SearchError::InvalidQuery {
                reason: "empty glob pattern".to_string(),
            });
        }
        Glob::new(glob).map_err(|e| SearchError::InvalidQuery {
            reason: format!("invalid glob `{glob}`: {e}"),
        })?;
    }
    Ok(())
}

/// Extension of a `*.<ext>` glob with no other wildcard or separator
fn simple_extension(glob: &str) -> Option<&str> {
    let ext = glob.strip_prefix("*.")?;
    let plain = !ext.is_empty()
        && !ext.contains(['/', '\\', '*', '?', '[', ']', '{', '}', ',', '!']);
    plain.then_some(ext)
}

/// Merge two or more simple suffix globs into one brace glob
///
/// `*.ts`, `*.tsx`, `*.js` become `*.{ts,tsx,js}`. Complex globs are kept
/// as-is after the merged one. A single simple glob is left alone.
#[must_use]
pub fn consolidate(globs: &[String]) -> Vec<String> {
    let mut extensions: Vec<&str> = Vec::new();
    let mut complex: Vec<String> = Vec::new();

    for glob in globs {
        match simple_extension(glob) {
            Some(ext) => {
                if !extensions.contains(&ext) {
                    extensions.push(ext);
                }
            }
            None => complex.push(glob.clone()),
        }
    }

    let mut out = Vec::with_capacity(complex.len() + 1);
    match extensions.as_slice() {
        [] => {}
        [only] => out.push(format!("*.{only}")),
        many => out.push(format!("*.{{{}}}", many.join(","))),
    }
    out.extend(complex);
    out
}
