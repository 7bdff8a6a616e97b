//! Query validation and normalization
//!
//! `validate` inspects the caller's query and rejects malformed ones before
//! any process is spawned. `normalize` then applies the workflow profile to
//! unset fields, fills defaults and clamps page sizes. Normalizing a
//! normalized query returns it unchanged.

use super::types::{SearchQuery, SortBy, Workflow};
use crate::SearchError;
use crate::config::{MAX_CONTEXT_LINES, SearchConfig};
use crate::search::sorting::default_direction;

/// Field values a workflow contributes
#[derive(Debug, Clone, Copy)]
struct Profile {
    context_lines: u32,
    files_per_page: u32,
    matches_per_page: u32,
    match_content_length: u32,
    max_matches_per_file: Option<u32>,
}

fn profile(workflow: Workflow) -> Profile {
    match workflow {
        Workflow::Discovery => Profile {
            context_lines: 2,
            files_per_page: 20,
            matches_per_page: 20,
            match_content_length: 300,
            max_matches_per_file: None,
        },
        Workflow::Paginated => Profile {
            context_lines: 0,
            files_per_page: 10,
            matches_per_page: 10,
            match_content_length: 200,
            max_matches_per_file: None,
        },
        Workflow::Detailed => Profile {
            context_lines: 5,
            files_per_page: 5,
            matches_per_page: 50,
            match_content_length: 1000,
            max_matches_per_file: None,
        },
        Workflow::Precise => Profile {
            context_lines: 0,
            files_per_page: 10,
            matches_per_page: 3,
            match_content_length: 150,
            max_matches_per_file: Some(10),
        },
    }
}

fn invalid(reason: impl Into<String>) -> SearchError {
    SearchError::InvalidQuery {
        reason: reason.into(),
    }
}

fn reject_zero(name: &str, value: Option<u32>) -> Result<(), SearchError> {
    if value == Some(0) {
        return Err(invalid(format!("{name} must be at least 1")));
    }
    Ok(())
}

fn is_filesize(size: &str) -> bool {
    let digits = size.trim_end_matches(['K', 'M', 'G']);
    !digits.is_empty()
        && size.len() - digits.len() <= 1
        && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Reject malformed queries; returns warnings for values that will be clamped
///
/// # Errors
/// `InvalidQuery` naming the first conflicting or malformed field.
pub fn validate(query: &SearchQuery, config: &SearchConfig) -> Result<Vec<String>, SearchError> {
    if query.pattern.is_empty() {
        return Err(invalid("pattern must not be empty"));
    }
    if query.path.trim().is_empty() {
        return Err(invalid("path must not be empty"));
    }
    if query.fixed_string && query.perl_regex {
        return Err(invalid("fixedString and perlRegex are mutually exclusive"));
    }
    if query.case_insensitive && query.case_sensitive {
        return Err(invalid("caseInsensitive and caseSensitive are mutually exclusive"));
    }
    let modes = [query.files_only, query.files_without_match, query.count]
        .iter()
        .filter(|&&set| set)
        .count();
    if modes > 1 {
        return Err(invalid(
            "at most one of filesOnly, filesWithoutMatch and count may be set",
        ));
    }

    reject_zero("filePageNumber", query.file_page_number)?;
    reject_zero("filesPerPage", query.files_per_page)?;
    reject_zero("matchesPerPage", query.matches_per_page)?;
    reject_zero("matchPageNumber", query.match_page_number)?;
    reject_zero("matchContentLength", query.match_content_length)?;
    reject_zero("maxFiles", query.max_files)?;
    reject_zero("maxMatchesPerFile", query.max_matches_per_file)?;

    for (name, value) in [
        ("contextLines", query.context_lines),
        ("beforeLines", query.before_lines),
        ("afterLines", query.after_lines),
    ] {
        if let Some(lines) = value
            && lines > MAX_CONTEXT_LINES
        {
            return Err(invalid(format!(
                "{name}={lines} exceeds the maximum of {MAX_CONTEXT_LINES}"
            )));
        }
    }

    if let Some(size) = &query.max_filesize
        && !is_filesize(size)
    {
        return Err(invalid(format!(
            "maxFilesize `{size}` must be a number with an optional K, M or G suffix"
        )));
    }

    let mut warnings = Vec::new();
    for (name, value, max) in [
        ("filesPerPage", query.files_per_page, config.max_files_per_page),
        ("matchesPerPage", query.matches_per_page, config.max_matches_per_page),
        (
            "matchContentLength",
            query.match_content_length,
            config.max_match_content_length,
        ),
    ] {
        if let Some(value) = value
            && value > max
        {
            warnings.push(format!("{name}={value} exceeds the maximum; using {max}"));
        }
    }
    Ok(warnings)
}

/// Apply the workflow profile and defaults to unset fields, then clamp
#[must_use]
pub fn normalize(mut query: SearchQuery, config: &SearchConfig) -> SearchQuery {
    if let Some(workflow) = query.workflow {
        let p = profile(workflow);
        query.context_lines.get_or_insert(p.context_lines);
        query.files_per_page.get_or_insert(p.files_per_page);
        query.matches_per_page.get_or_insert(p.matches_per_page);
        query.match_content_length.get_or_insert(p.match_content_length);
        if query.max_matches_per_file.is_none() {
            query.max_matches_per_file = p.max_matches_per_file;
        }
    }

    let files_per_page = query
        .files_per_page
        .unwrap_or(config.default_files_per_page)
        .min(config.max_files_per_page);
    let matches_per_page = query
        .matches_per_page
        .unwrap_or(config.default_matches_per_page)
        .min(config.max_matches_per_page);
    let content_length = query
        .match_content_length
        .unwrap_or(config.default_match_content_length)
        .min(config.max_match_content_length);

    query.files_per_page = Some(files_per_page);
    query.matches_per_page = Some(matches_per_page);
    query.match_content_length = Some(content_length);
    query.file_page_number.get_or_insert(1);
    query.match_page_number.get_or_insert(1);
    query.smart_case.get_or_insert(false);

    let sort = *query.sort.get_or_insert(if query.show_file_last_modified {
        SortBy::Modified
    } else {
        SortBy::Path
    });
    query.sort_direction.get_or_insert(default_direction(sort));

    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::types::SortDirection;

    fn config() -> SearchConfig {
        SearchConfig::default()
    }

    #[test]
    fn test_defaults_are_filled() {
        let q = normalize(SearchQuery::new("foo", "/repo"), &config());
        assert_eq!(q.files_per_page, Some(10));
        assert_eq!(q.matches_per_page, Some(10));
        assert_eq!(q.match_content_length, Some(200));
        assert_eq!(q.file_page_number, Some(1));
        assert_eq!(q.sort, Some(SortBy::Path));
        assert_eq!(q.sort_direction, Some(SortDirection::Ascending));
    }

    #[test]
    fn test_workflow_only_fills_unset_fields() {
        let mut raw = SearchQuery::new("foo", "/repo");
        raw.workflow = Some(Workflow::Detailed);
        raw.matches_per_page = Some(7);
        let q = normalize(raw, &config());
        assert_eq!(q.matches_per_page, Some(7));
        assert_eq!(q.context_lines, Some(5));
        assert_eq!(q.files_per_page, Some(5));
    }

    #[test]
    fn test_precise_narrows_discovery_widens() {
        let mut precise = SearchQuery::new("foo", "/repo");
        precise.workflow = Some(Workflow::Precise);
        let mut discovery = precise.clone();
        discovery.workflow = Some(Workflow::Discovery);

        let precise = normalize(precise, &config());
        let discovery = normalize(discovery, &config());
        assert!(precise.matches_per_page < discovery.matches_per_page);
        assert!(precise.context_lines < discovery.context_lines);
        assert_eq!(precise.max_matches_per_file, Some(10));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for workflow in [
            None,
            Some(Workflow::Discovery),
            Some(Workflow::Paginated),
            Some(Workflow::Detailed),
            Some(Workflow::Precise),
        ] {
            let mut raw = SearchQuery::new("foo", "/repo");
            raw.workflow = workflow;
            raw.files_per_page = Some(500);
            raw.show_file_last_modified = true;
            let once = normalize(raw, &config());
            let twice = normalize(once.clone(), &config());
            assert_eq!(once, twice, "{workflow:?}");
        }
    }

    #[test]
    fn test_oversized_pages_are_clamped_with_warning() {
        let mut raw = SearchQuery::new("foo", "/repo");
        raw.files_per_page = Some(500);
        let warnings = validate(&raw, &config()).expect("valid");
        assert!(warnings[0].contains("filesPerPage=500"));
        assert_eq!(normalize(raw, &config()).files_per_page, Some(50));
    }

    #[test]
    fn test_modified_sort_defaults_to_newest_first() {
        let mut raw = SearchQuery::new("foo", "/repo");
        raw.show_file_last_modified = true;
        let q = normalize(raw, &config());
        assert_eq!(q.sort, Some(SortBy::Modified));
        assert_eq!(q.sort_direction, Some(SortDirection::Descending));
    }

    #[test]
    fn test_rejects_conflicts() {
        let base = SearchQuery::new("foo", "/repo");
        let cases: Vec<(&str, SearchQuery)> = vec![
            ("empty pattern", SearchQuery::new("", "/repo")),
            ("fixed+perl", SearchQuery { fixed_string: true, perl_regex: true, ..base.clone() }),
            ("case", SearchQuery { case_insensitive: true, case_sensitive: true, ..base.clone() }),
            ("modes", SearchQuery { files_only: true, count: true, ..base.clone() }),
            ("zero page", SearchQuery { file_page_number: Some(0), ..base.clone() }),
            ("zero size", SearchQuery { matches_per_page: Some(0), ..base.clone() }),
            ("context", SearchQuery { context_lines: Some(51), ..base.clone() }),
            ("filesize", SearchQuery { max_filesize: Some("big".into()), ..base.clone() }),
        ];
        for (name, query) in cases {
            let err = validate(&query, &config()).expect_err(name);
            assert_eq!(err.code(), "INVALID_QUERY", "{name}");
        }
    }
}
