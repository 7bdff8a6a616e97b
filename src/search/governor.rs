//! Result-volume limits
//!
//! Unbounded results are rejected before they are materialized, with a
//! concrete page size to retry with. Size estimates only ever add warnings.

use super::types::DirectoryStats;
use crate::SearchError;
use crate::config::SearchConfig;

/// Reject a search touching too many files without explicit pagination
///
/// # Errors
/// `ResultsTooLarge` carrying the configured default page size.
pub fn check_files(total: usize, explicit: bool, config: &SearchConfig) -> Result<(), SearchError> {
    check(total, explicit, config.max_unpaginated_files, "files", config.default_files_per_page)
}

/// Reject a listing with too many entries without explicit pagination
///
/// # Errors
/// `ResultsTooLarge` carrying the configured default page size.
pub fn check_entries(total: usize, explicit: bool, config: &SearchConfig) -> Result<(), SearchError> {
    check(
        total,
        explicit,
        config.max_unpaginated_entries,
        "entries",
        config.default_entries_per_page,
    )
}

fn check(
    total: usize,
    explicit: bool,
    limit: usize,
    unit: &'static str,
    suggested_page_size: u32,
) -> Result<(), SearchError> {
    if explicit || total <= limit {
        return Ok(());
    }
    log::info!("Rejecting unpaginated result: {total} {unit} (limit {limit})");
    Err(SearchError::ResultsTooLarge {
        total,
        limit,
        unit,
        suggested_page_size,
    })
}

/// Warning for a large, unscoped search target
#[must_use]
pub fn directory_warning(stats: &DirectoryStats, scoped: bool) -> Option<String> {
    if !stats.is_large || scoped {
        return None;
    }
    Some(format!(
        "Large search target (~{:.0} MB, ~{} files); add include globs, fileType or excludeDir to speed this up",
        stats.estimated_size_mb, stats.estimated_file_count
    ))
}

/// Hint emitted when the `maxFiles` cap removed files
#[must_use]
pub fn limited_hint(max_files: u32) -> String {
    format!("Results limited to {max_files} files by maxFiles; narrow the pattern or raise maxFiles to see more")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_over_limit_without_pagination_are_rejected() {
        let config = SearchConfig::default();
        let err = check_files(201, false, &config).expect_err("too many files");
        assert_eq!(err.code(), "RESULTS_TOO_LARGE");
        assert!(err.hints()[0].contains("filesPerPage=10"));
    }

    #[test]
    fn test_explicit_pagination_lifts_the_limit() {
        let config = SearchConfig::default();
        assert!(check_files(10_000, true, &config).is_ok());
        assert!(check_files(200, false, &config).is_ok());
    }

    #[test]
    fn test_entries_suggest_entry_page_size() {
        let err = check_entries(501, false, &SearchConfig::default()).expect_err("too many");
        assert!(err.hints()[0].contains("entriesPerPage=50"));
    }

    #[test]
    fn test_directory_warning_only_when_large_and_unscoped() {
        let large = DirectoryStats {
            estimated_size_mb: 512.0,
            estimated_file_count: 9000,
            is_large: true,
        };
        assert!(directory_warning(&large, false).is_some());
        assert!(directory_warning(&large, true).is_none());
        assert!(directory_warning(&DirectoryStats::default(), false).is_none());
    }
}
