//! Resource limits and defaults for local search operations
//!
//! Every tuning parameter lives here. A `SearchConfig` is built once,
//! wrapped in an `Arc` and shared read-only by all concurrent queries.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default execution timeout for a backend process
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default stdout ceiling (10 MiB)
pub const DEFAULT_MAX_STDOUT_BYTES: usize = 10 * 1024 * 1024;

/// Default stderr ceiling (1 MiB)
pub const DEFAULT_MAX_STDERR_BYTES: usize = 1024 * 1024;

pub const DEFAULT_FILES_PER_PAGE: u32 = 10;
pub const MAX_FILES_PER_PAGE: u32 = 50;
pub const DEFAULT_MATCHES_PER_PAGE: u32 = 10;
pub const MAX_MATCHES_PER_PAGE: u32 = 100;

/// Default code-point budget for a stitched match value
pub const DEFAULT_MATCH_CONTENT_LENGTH: u32 = 200;
pub const MAX_MATCH_CONTENT_LENGTH: u32 = 1000;

pub const DEFAULT_ENTRIES_PER_PAGE: u32 = 50;

/// Context lines above this are rejected as a malformed query
pub const MAX_CONTEXT_LINES: u32 = 50;

/// Configuration shared by every query executed through `LocalSearch`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchConfig {
    pub timeout_ms: u64,
    pub max_stdout_bytes: usize,
    pub max_stderr_bytes: usize,
    pub default_files_per_page: u32,
    pub max_files_per_page: u32,
    pub default_matches_per_page: u32,
    pub max_matches_per_page: u32,
    pub default_match_content_length: u32,
    pub max_match_content_length: u32,
    pub default_entries_per_page: u32,
    /// Search results spanning more files than this need explicit pagination
    pub max_unpaginated_files: usize,
    /// Listings with more entries than this need explicit pagination
    pub max_unpaginated_entries: usize,
    pub large_directory_mb: f64,
    pub large_directory_files: u64,
    pub max_batch_queries: usize,
    pub primary_program: String,
    pub fallback_program: String,
    pub find_program: String,
    pub allowed_roots: Vec<PathBuf>,
    pub denied_roots: Vec<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_stdout_bytes: DEFAULT_MAX_STDOUT_BYTES,
            max_stderr_bytes: DEFAULT_MAX_STDERR_BYTES,
            default_files_per_page: DEFAULT_FILES_PER_PAGE,
            max_files_per_page: MAX_FILES_PER_PAGE,
            default_matches_per_page: DEFAULT_MATCHES_PER_PAGE,
            max_matches_per_page: MAX_MATCHES_PER_PAGE,
            default_match_content_length: DEFAULT_MATCH_CONTENT_LENGTH,
            max_match_content_length: MAX_MATCH_CONTENT_LENGTH,
            default_entries_per_page: DEFAULT_ENTRIES_PER_PAGE,
            max_unpaginated_files: 200,
            max_unpaginated_entries: 500,
            large_directory_mb: 100.0,
            large_directory_files: 5_000,
            max_batch_queries: 10,
            primary_program: "rg".to_string(),
            fallback_program: "grep".to_string(),
            find_program: "find".to_string(),
            allowed_roots: Vec::new(),
            denied_roots: Vec::new(),
        }
    }
}

impl SearchConfig {
    /// Defaults overlaid with `KODEGEN_*` environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dirs) = std::env::var_os("KODEGEN_ALLOWED_DIRS") {
            config.allowed_roots = std::env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        if let Some(dirs) = std::env::var_os("KODEGEN_DENIED_DIRS") {
            config.denied_roots = std::env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        if let Some(ms) = parse_env::<u64>("KODEGEN_SEARCH_TIMEOUT_MS") {
            config.timeout_ms = ms;
        }
        if let Some(bytes) = parse_env::<usize>("KODEGEN_SEARCH_MAX_OUTPUT_BYTES") {
            config.max_stdout_bytes = bytes;
        }
        if let Ok(program) = std::env::var("KODEGEN_RG_PATH")
            && !program.is_empty()
        {
            config.primary_program = program;
        }
        if let Ok(program) = std::env::var("KODEGEN_GREP_PATH")
            && !program.is_empty()
        {
            config.fallback_program = program;
        }

        config
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {key}={raw}: not a valid number");
            None
        }
    }
}
