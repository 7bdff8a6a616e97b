use crate::search::exec::{ExecError, OutputStream};
use std::path::PathBuf;
use std::time::Duration;

/// Every failure a query can end in. Converted into a `status: "error"`
/// result at the query boundary, never propagated to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("path rejected: {}: {reason}", path.display())]
    PathRejected { path: PathBuf, reason: String },

    #[error(
        "{total} {unit} would be returned without pagination (limit {limit})"
    )]
    ResultsTooLarge {
        total: usize,
        limit: usize,
        unit: &'static str,
        suggested_page_size: u32,
    },

    #[error("no search backend available: neither `{primary}` nor `{fallback}` could be executed")]
    BackendUnavailable { primary: String, fallback: String },

    #[error("`{feature}` is not supported by the fallback backend `{fallback}`; install `{primary}`")]
    FeatureRequiresPrimary {
        feature: String,
        primary: String,
        fallback: String,
    },

    #[error("`{program}` failed (exit code {}): {stderr}", exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    ExecutionFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("`{program}` timed out after {}ms", timeout.as_millis())]
    Timeout { program: String, timeout: Duration },

    #[error("{stream} exceeded the {limit} byte output limit")]
    OutputTooLarge { stream: OutputStream, limit: usize },
}

impl SearchError {
    /// Stable machine-readable code surfaced as `errorCode`
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidQuery { .. } => "INVALID_QUERY",
            Self::PathRejected { .. } => "PATH_REJECTED",
            Self::ResultsTooLarge { .. } => "RESULTS_TOO_LARGE",
            Self::BackendUnavailable { .. } => "BACKEND_UNAVAILABLE",
            Self::FeatureRequiresPrimary { .. } => "FEATURE_REQUIRES_PRIMARY_BACKEND",
            Self::ExecutionFailed { .. } => "EXECUTION_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::OutputTooLarge { .. } => "OUTPUT_TOO_LARGE",
        }
    }

    /// Actionable remediation for the caller
    #[must_use]
    pub fn hints(&self) -> Vec<String> {
        match self {
            Self::InvalidQuery { .. } => vec![
                "Fix the conflicting or malformed fields and retry".to_string(),
            ],
            Self::PathRejected { .. } => vec![
                "Search inside an allowed workspace root (KODEGEN_ALLOWED_DIRS)".to_string(),
            ],
            Self::ResultsTooLarge {
                unit,
                suggested_page_size,
                ..
            } => {
                let page_field = if *unit == "entries" {
                    "entriesPerPage"
                } else {
                    "filesPerPage"
                };
                vec![
                    format!("Paginate explicitly, e.g. {page_field}={suggested_page_size}"),
                    "Narrow the scope with include globs, fileType or excludeDir".to_string(),
                    "Use a more specific pattern".to_string(),
                ]
            }
            Self::BackendUnavailable { primary, .. } => vec![
                format!("Install ripgrep (`{primary}`): https://github.com/BurntSushi/ripgrep#installation"),
                "Or set KODEGEN_RG_PATH to an existing ripgrep binary".to_string(),
            ],
            Self::FeatureRequiresPrimary { feature, primary, .. } => vec![
                format!("Install ripgrep (`{primary}`) to use `{feature}`"),
                format!("Or retry without `{feature}`"),
            ],
            Self::ExecutionFailed { .. } => vec![
                "Check the pattern syntax for the selected mode (regex, fixedString, perlRegex)"
                    .to_string(),
                "Check that the target path is readable".to_string(),
            ],
            Self::Timeout { .. } => vec![
                "Narrow the search path or add include/fileType filters".to_string(),
                "Exclude dependency folders such as node_modules, target or vendor".to_string(),
                "Use a more specific pattern".to_string(),
            ],
            Self::OutputTooLarge { .. } => vec![
                "Use a more specific pattern".to_string(),
                "Add fileType or include filters to limit the files searched".to_string(),
                "Avoid searching node_modules wholesale; add it to excludeDir".to_string(),
                "Run with filesOnly=true first, then search the interesting files".to_string(),
            ],
        }
    }
}

impl From<ExecError> for SearchError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Timeout { program, timeout } => Self::Timeout { program, timeout },
            ExecError::OutputLimitExceeded { stream, limit, .. } => {
                Self::OutputTooLarge { stream, limit }
            }
            ExecError::Spawn { program, source } => Self::ExecutionFailed {
                program,
                exit_code: None,
                stderr: source.to_string(),
            },
            ExecError::Io { program, source } => Self::ExecutionFailed {
                program,
                exit_code: None,
                stderr: source.to_string(),
            },
        }
    }
}
