use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// QUERY
// ============================================================================

/// Named workflow profile applied by the normalizer to unset fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    /// Broad first look: some context, wide file and match pages
    Discovery,
    /// Balanced file and match pages, no context
    Paginated,
    /// Wide context, long values, few files per page
    Detailed,
    /// No context, few matches per file
    Precise,
}

/// Sort key for the file list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Path,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// How the pattern is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternMode {
    Regex,
    FixedString,
    PerlRegex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    Sensitive,
    Insensitive,
    Smart,
}

/// What a search returns per file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Normal,
    FilesOnly,
    FilesWithoutMatch,
    Count,
}

/// A content search request
///
/// `path` arrives already absolute; it is still routed through the path
/// validator before any process is spawned. Unset optional fields are filled
/// by `normalize::normalize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub pattern: String,
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<Workflow>,

    // Pattern interpretation
    #[serde(default)]
    pub fixed_string: bool,
    #[serde(default)]
    pub perl_regex: bool,
    #[serde(default)]
    pub multiline: bool,

    // Case
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_case: Option<bool>,

    #[serde(default)]
    pub whole_word: bool,
    #[serde(default)]
    pub invert_match: bool,

    // Scope filters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_dir: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub no_ignore: bool,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    /// Size ceiling in ripgrep syntax, e.g. `1M` or `500K`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_filesize: Option<String>,

    // Context window. `before_lines`/`after_lines` override `context_lines`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_lines: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_lines: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_lines: Option<u32>,

    // Output mode (at most one)
    #[serde(default)]
    pub files_only: bool,
    #[serde(default)]
    pub files_without_match: bool,
    #[serde(default)]
    pub count: bool,

    /// Per-file match cap handed to the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_matches_per_file: Option<u32>,
    /// Global file cap applied before file pagination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_files: Option<u32>,

    // Pagination cursors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_per_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches_per_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_page_number: Option<u32>,

    /// Max code points of a stitched match value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_content_length: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<SortDirection>,
    #[serde(default)]
    pub show_file_last_modified: bool,
}

impl SearchQuery {
    #[must_use]
    pub fn new(pattern: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn pattern_mode(&self) -> PatternMode {
        if self.perl_regex {
            PatternMode::PerlRegex
        } else if self.fixed_string {
            PatternMode::FixedString
        } else {
            PatternMode::Regex
        }
    }

    #[must_use]
    pub fn case_mode(&self) -> CaseMode {
        if self.case_insensitive {
            CaseMode::Insensitive
        } else if self.case_sensitive {
            CaseMode::Sensitive
        } else if self.smart_case.unwrap_or(false) {
            CaseMode::Smart
        } else {
            CaseMode::Sensitive
        }
    }

    #[must_use]
    pub fn output_mode(&self) -> OutputMode {
        if self.files_only {
            OutputMode::FilesOnly
        } else if self.files_without_match {
            OutputMode::FilesWithoutMatch
        } else if self.count {
            OutputMode::Count
        } else {
            OutputMode::Normal
        }
    }

    /// Effective (before, after) context, with the explicit sides winning
    #[must_use]
    pub fn context_window(&self) -> (u32, u32) {
        let both = self.context_lines.unwrap_or(0);
        (
            self.before_lines.unwrap_or(both),
            self.after_lines.unwrap_or(both),
        )
    }

    /// True when the caller passed any pagination or capping parameter
    #[must_use]
    pub fn has_explicit_pagination(&self) -> bool {
        self.file_page_number.is_some()
            || self.files_per_page.is_some()
            || self.max_files.is_some()
    }

    /// True when include globs, a file type or excluded dirs narrow the walk
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        !self.include.is_empty() || self.file_type.is_some() || !self.exclude_dir.is_empty()
    }
}

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum SearchStatus {
    HasResults,
    Empty,
    Error,
}

/// Location of the original, untruncated match span.
///
/// Both values are UTF-8 byte counts. The serialized names are kept for
/// compatibility with existing consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MatchLocation {
    #[serde(rename = "charOffset")]
    pub byte_offset: u64,
    #[serde(rename = "charLength")]
    pub byte_length: u64,
}

/// A stitched match as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Match {
    pub value: String,
    pub location: MatchLocation,
    /// 1-based line number
    pub line: u64,
    /// 0-based byte column
    pub column: u64,
}

/// Match-level pagination for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchPagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    pub path: String,
    /// Match count for the file before match pagination
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_count: Option<usize>,
    pub matches: Vec<Match>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<MatchPagination>,
    /// ISO-8601 last-modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// File-level (or entry-level) pagination block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_per_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries_per_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_entries: Option<usize>,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub status: SearchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_matches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub hints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResult {
    #[must_use]
    pub fn empty(warnings: Vec<String>, hints: Vec<String>) -> Self {
        Self {
            status: SearchStatus::Empty,
            files: Some(Vec::new()),
            total_files: Some(0),
            total_matches: Some(0),
            pagination: None,
            warnings,
            hints,
            error_code: None,
            error: None,
        }
    }

    #[must_use]
    pub fn from_error(err: &crate::SearchError, warnings: Vec<String>) -> Self {
        Self {
            status: SearchStatus::Error,
            files: None,
            total_files: None,
            total_matches: None,
            pagination: None,
            warnings,
            hints: err.hints(),
            error_code: Some(err.code().to_string()),
            error: Some(err.to_string()),
        }
    }
}

/// Cheap size estimate of a search target
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryStats {
    pub estimated_size_mb: f64,
    pub estimated_file_count: u64,
    pub is_large: bool,
}

// ============================================================================
// FILE LISTING
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    #[default]
    File,
    Directory,
    Symlink,
    Any,
}

/// A file discovery request executed through `find`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileListQuery {
    pub path: String,
    /// Glob on the entry name (`-name`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_pattern: Option<String>,
    #[serde(default)]
    pub case_insensitive: bool,
    /// Extended regex on the whole path (`-regex`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_pattern: Option<String>,
    #[serde(default)]
    pub entry_type: EntryType,
    /// Relative window such as `2h`, `3d`, `1w`, `2m`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_within: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_before: Option<String>,
    /// find size syntax, e.g. `10k`, `2M`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_greater: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_less: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_dir: Vec<String>,
    #[serde(default)]
    pub include_hidden: bool,
    #[serde(default)]
    pub empty_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries_per_page: Option<u32>,
    #[serde(default)]
    pub show_last_modified: bool,
}

impl FileListQuery {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileListResult {
    pub status: SearchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<FileEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_entries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub hints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileListResult {
    #[must_use]
    pub fn from_error(err: &crate::SearchError, warnings: Vec<String>) -> Self {
        Self {
            status: SearchStatus::Error,
            entries: None,
            total_entries: None,
            pagination: None,
            warnings,
            hints: err.hints(),
            error_code: Some(err.code().to_string()),
            error: Some(err.to_string()),
        }
    }
}
