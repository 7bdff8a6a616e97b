use async_trait::async_trait;
use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::time::{Duration, timeout};

use crate::config::SearchConfig;

const PATH_VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of validating a requested search root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PathValidation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitized_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PathValidation {
    #[must_use]
    pub fn valid(path: PathBuf) -> Self {
        Self {
            is_valid: true,
            sanitized_path: Some(path),
            error: None,
        }
    }

    #[must_use]
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            sanitized_path: None,
            error: Some(error.into()),
        }
    }
}

/// Decides whether a path may be searched and returns its sanitized form
#[async_trait]
pub trait PathValidator: Send + Sync {
    async fn validate(&self, path: &str) -> PathValidation;
}

/// Validator backed by allow and deny lists of workspace roots
///
/// The deny list takes precedence. An empty allow list allows everything not
/// denied. Comparison is case-insensitive on normalized path strings.
#[derive(Debug, Clone, Default)]
pub struct AllowListValidator {
    allowed: Vec<String>,
    denied: Vec<String>,
}

/// Normalize all paths consistently
fn normalize_path(p: &str) -> String {
    let mut normalized = expand_home(p).to_lowercase();
    if normalized.len() > 1 && normalized.ends_with(std::path::MAIN_SEPARATOR) {
        normalized.pop();
    }
    normalized
}

/// Expand home directory (~) in file paths
fn expand_home(filepath: &str) -> String {
    if (filepath.starts_with("~/") || filepath == "~")
        && let Some(home_dir) = dirs::home_dir()
    {
        let rest = filepath[1..].trim_start_matches('/');
        return home_dir.join(rest).to_string_lossy().to_string();
    }
    filepath.to_string()
}

/// Exact match or a descendant of `root`
fn is_within(path: &str, root: &str) -> bool {
    if root == std::path::MAIN_SEPARATOR_STR {
        return true;
    }
    path == root || path.starts_with(&format!("{root}{}", std::path::MAIN_SEPARATOR))
}

impl AllowListValidator {
    #[must_use]
    pub fn new(allowed: &[PathBuf], denied: &[PathBuf]) -> Self {
        let normalize_all = |roots: &[PathBuf]| -> Vec<String> {
            roots
                .iter()
                .map(|root| normalize_path(&root.to_string_lossy()))
                .collect()
        };
        Self {
            allowed: normalize_all(allowed),
            denied: normalize_all(denied),
        }
    }

    #[must_use]
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(&config.allowed_roots, &config.denied_roots)
    }

    /// Returns the restriction reason when `path` may not be searched
    fn restriction(&self, path: &str) -> Option<String> {
        let normalized = normalize_path(path);

        if let Some(denied) = self.denied.iter().find(|root| is_within(&normalized, root)) {
            return Some(format!(
                "Path is in denied directory: {denied}\n\
                 To modify restrictions, unset KODEGEN_DENIED_DIRS or add the path to KODEGEN_ALLOWED_DIRS"
            ));
        }

        if !self.allowed.is_empty() && !self.allowed.iter().any(|root| is_within(&normalized, root)) {
            return Some(format!(
                "Path not in allowed directories\n\
                 Current allowed directories: {:?}\n\
                 To allow access: export KODEGEN_ALLOWED_DIRS=\"{path}:$KODEGEN_ALLOWED_DIRS\"",
                self.allowed
            ));
        }

        None
    }

    async fn check(&self, requested_path: &str) -> PathValidation {
        let expanded = expand_home(requested_path);
        let absolute = if Path::new(&expanded).is_absolute() {
            PathBuf::from(&expanded)
        } else {
            match std::env::current_dir() {
                Ok(cwd) => cwd.join(&expanded),
                Err(e) => return PathValidation::rejected(format!("cannot resolve relative path: {e}")),
            }
        };

        if let Some(reason) = self.restriction(&absolute.to_string_lossy()) {
            warn!("Path access denied: {requested_path}");
            return PathValidation::rejected(reason);
        }

        if fs::metadata(&absolute).await.is_err() {
            return PathValidation::rejected(format!("Path does not exist: {}", absolute.display()));
        }

        // Resolve symlinks; fall back to the absolute path
        match fs::canonicalize(&absolute).await {
            Ok(canonical) => PathValidation::valid(canonical),
            Err(_) => PathValidation::valid(absolute),
        }
    }
}

#[async_trait]
impl PathValidator for AllowListValidator {
    async fn validate(&self, path: &str) -> PathValidation {
        if let Ok(result) = timeout(PATH_VALIDATION_TIMEOUT, self.check(path)).await {
            result
        } else {
            warn!("Path validation timeout for: {path}");
            PathValidation::rejected("Path validation timeout after 10 seconds")
        }
    }
}
