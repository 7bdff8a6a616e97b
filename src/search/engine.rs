//! Query pipeline: validate, route, execute, parse, stitch, paginate
//!
//! Every public operation converts failures into a structured result at the
//! boundary; nothing here returns `Err` to the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use futures::future::join_all;

use super::backend::{self, Backend, BackendProbe, SystemProbe};
use super::command::{self, Platform, find, grep};
use super::exec::{self, ExecOptions, ExecOutput};
use super::governor;
use super::metadata;
use super::normalize;
use super::paginate::{self, PageWindow};
use super::parse::text::ColumnLocator;
use super::parse::{FileHits, ParsedOutput, json, text};
use super::sorting::{self, SortKey};
use super::stitch;
use super::types::{
    FileEntry, FileListQuery, FileListResult, FileResult, OutputMode, SearchQuery, SearchResult,
    SearchStatus, SortBy,
};
use super::estimator;
use crate::SearchError;
use crate::config::SearchConfig;
use crate::validation::{AllowListValidator, PathValidator};

/// Backends report their own time limits on stderr
const TIMEOUT_MARKERS: &[&str] = &["timed out", "timeout"];

const BYTE_OFFSET_WARNING: &str = "location.charOffset and location.charLength are UTF-8 byte \
     offsets, not character offsets; they diverge from character positions on multi-byte text";

/// Local code search over external backends
#[derive(Clone)]
pub struct LocalSearch {
    config: Arc<SearchConfig>,
    validator: Arc<dyn PathValidator>,
    probe: Arc<dyn BackendProbe>,
    platform: Platform,
}

impl std::fmt::Debug for LocalSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSearch")
            .field("config", &self.config)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

/// A file (or listing entry) carried through sorting and pagination
struct Ranked<T> {
    path: String,
    modified: Option<SystemTime>,
    item: T,
}

impl<T> SortKey for Ranked<T> {
    fn sort_path(&self) -> &str {
        &self.path
    }

    fn sort_modified(&self) -> Option<SystemTime> {
        self.modified
    }
}

impl LocalSearch {
    /// Search with the allow-list validator and system probe built from `config`
    #[must_use]
    pub fn new(config: SearchConfig) -> Self {
        let validator = Arc::new(AllowListValidator::from_config(&config));
        Self::with_collaborators(config, validator, Arc::new(SystemProbe::new()))
    }

    #[must_use]
    pub fn with_collaborators(
        config: SearchConfig,
        validator: Arc<dyn PathValidator>,
        probe: Arc<dyn BackendProbe>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            validator,
            probe,
            platform: Platform::current(),
        }
    }

    /// Override the tool flavor the command builders target
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn exec_options(&self) -> ExecOptions {
        ExecOptions {
            timeout: self.config.timeout(),
            max_stdout_bytes: self.config.max_stdout_bytes,
            max_stderr_bytes: self.config.max_stderr_bytes,
            cwd: None,
        }
    }

    /// Run one content search
    pub async fn search(&self, query: SearchQuery) -> SearchResult {
        let mut warnings = Vec::new();
        match self.run_search(query, &mut warnings).await {
            Ok(result) => result,
            Err(err) => {
                log::warn!("Search failed [{}]: {err}", err.code());
                SearchResult::from_error(&err, warnings)
            }
        }
    }

    /// Run independent searches concurrently; output order equals input order
    ///
    /// Queries beyond `max_batch_queries` are not executed and are answered
    /// with an `INVALID_QUERY` result each.
    pub async fn search_batch(&self, queries: Vec<SearchQuery>) -> Vec<SearchResult> {
        let limit = self.config.max_batch_queries;
        let total = queries.len();
        if total > limit {
            log::warn!("Batch of {total} queries exceeds the limit of {limit}");
        }

        let runs = queries.into_iter().enumerate().map(|(i, query)| async move {
            if i < limit {
                self.search(query).await
            } else {
                let err = SearchError::InvalidQuery {
                    reason: format!(
                        "batch holds {total} queries but at most {limit} run per call; query {} was skipped",
                        i + 1
                    ),
                };
                SearchResult::from_error(&err, Vec::new())
            }
        });
        join_all(runs).await
    }

    /// List files and directories through `find`
    pub async fn list_files(&self, query: FileListQuery) -> FileListResult {
        let mut warnings = Vec::new();
        match self.run_list(query, &mut warnings).await {
            Ok(result) => result,
            Err(err) => {
                log::warn!("Listing failed [{}]: {err}", err.code());
                FileListResult::from_error(&err, warnings)
            }
        }
    }

    async fn validate_path(&self, path: &str) -> Result<PathBuf, SearchError> {
        let validation = self.validator.validate(path).await;
        match validation.sanitized_path {
            Some(sanitized) if validation.is_valid => Ok(sanitized),
            _ => Err(SearchError::PathRejected {
                path: PathBuf::from(path),
                reason: validation
                    .error
                    .unwrap_or_else(|| "rejected by path validator".to_string()),
            }),
        }
    }

    async fn run_search(
        &self,
        raw: SearchQuery,
        warnings: &mut Vec<String>,
    ) -> Result<SearchResult, SearchError> {
        let config = &*self.config;

        warnings.extend(normalize::validate(&raw, config)?);
        let explicit = raw.has_explicit_pagination() || raw.workflow.is_some();
        let mut query = normalize::normalize(raw, config);

        let root = self.validate_path(&query.path).await?;
        query.path = root.to_string_lossy().into_owned();

        let stats = estimator::estimate(&root, config).await;
        warnings.extend(governor::directory_warning(&stats, query.is_scoped()));

        let backend = backend::select(self.probe.as_ref(), config).await?;
        if backend == Backend::Fallback {
            warnings.push(backend::fallback_warning(config));
        }

        let cmd = command::build_search(&query, backend, backend.program(config), self.platform)?;
        warnings.extend(cmd.warnings.iter().cloned());
        log::debug!("Running {cmd}");

        let output = exec::run(&cmd.program, &cmd.args, &self.exec_options()).await?;
        self.check_exit(&cmd.program, &output)?;

        let mut parsed = parse_output(&query, backend, &output.stdout);
        if backend == Backend::Fallback && grep::filters_hidden_in_process(&query) {
            parsed
                .files
                .retain(|hits| !grep::is_hidden_below(&query.path, &hits.path));
        }
        if parsed.files.is_empty() {
            return Ok(SearchResult::empty(std::mem::take(warnings), Vec::new()));
        }

        self.assemble(&query, parsed, explicit, warnings).await
    }

    /// Exit 0 and 1 are normal outcomes for the grep family
    fn check_exit(&self, program: &str, output: &ExecOutput) -> Result<(), SearchError> {
        match output.exit_code {
            Some(0) => Ok(()),
            Some(_) if reports_timeout(&output.stderr) => Err(SearchError::Timeout {
                program: program.to_string(),
                timeout: self.config.timeout(),
            }),
            Some(1) => Ok(()),
            Some(code) => Err(SearchError::ExecutionFailed {
                program: program.to_string(),
                exit_code: Some(code),
                stderr: output.stderr.trim().to_string(),
            }),
            None => Err(SearchError::Timeout {
                program: program.to_string(),
                timeout: self.config.timeout(),
            }),
        }
    }

    /// Sort, cap, govern and paginate parsed hits
    async fn assemble(
        &self,
        query: &SearchQuery,
        parsed: ParsedOutput,
        explicit: bool,
        warnings: &mut Vec<String>,
    ) -> Result<SearchResult, SearchError> {
        let config = &*self.config;
        let sort = query.sort.unwrap_or(SortBy::Path);
        let direction = query
            .sort_direction
            .unwrap_or_else(|| sorting::default_direction(sort));

        let times = if sort == SortBy::Modified {
            metadata::modified_times(parsed.files.iter().map(|f| f.path.as_str())).await
        } else {
            vec![None; parsed.files.len()]
        };
        let mut ranked: Vec<Ranked<FileHits>> = parsed
            .files
            .into_iter()
            .zip(times)
            .map(|(hits, modified)| Ranked {
                path: hits.path.clone(),
                modified,
                item: hits,
            })
            .collect();
        sorting::sort_files(&mut ranked, sort, direction);

        // Stage A
        let mut hints = Vec::new();
        if paginate::cap(&mut ranked, query.max_files) {
            hints.push(governor::limited_hint(query.max_files.unwrap_or_default()));
        }
        governor::check_files(ranked.len(), explicit, config)?;

        let total_files = ranked.len();
        let total_matches: usize = ranked.iter().map(|r| r.item.match_count()).sum();

        // Stage B
        let window = PageWindow::new(
            query.file_page_number.unwrap_or(1),
            query.files_per_page.unwrap_or(config.default_files_per_page),
            total_files,
        );
        if window.is_out_of_range() {
            warnings.push(format!(
                "filePageNumber={} is past the last page ({})",
                window.page,
                window.total_pages()
            ));
        }
        let mut page = window.slice(ranked);

        if query.show_file_last_modified && sort != SortBy::Modified {
            let times = metadata::modified_times(page.iter().map(|r| r.path.as_str())).await;
            for (entry, modified) in page.iter_mut().zip(times) {
                entry.modified = modified;
            }
        }

        // Stage C
        let mode = query.output_mode();
        let (before, after) = query.context_window();
        let max_chars = query
            .match_content_length
            .unwrap_or(config.default_match_content_length) as usize;
        let matches_per_page = query
            .matches_per_page
            .unwrap_or(config.default_matches_per_page);
        let match_page = query.match_page_number.unwrap_or(1);

        let mut more_matches = false;
        let mut returned_content = false;
        let files: Vec<FileResult> = page
            .into_iter()
            .map(|entry| {
                let last_modified = if query.show_file_last_modified {
                    entry.modified.map(metadata::iso8601)
                } else {
                    None
                };
                let hits = entry.item;

                match mode {
                    OutputMode::FilesOnly | OutputMode::FilesWithoutMatch => FileResult {
                        path: hits.path,
                        match_count: None,
                        matches: Vec::new(),
                        pagination: None,
                        last_modified,
                    },
                    OutputMode::Count => FileResult {
                        match_count: Some(hits.match_count()),
                        path: hits.path,
                        matches: Vec::new(),
                        pagination: None,
                        last_modified,
                    },
                    OutputMode::Normal => {
                        let match_window =
                            PageWindow::new(match_page, matches_per_page, hits.matches.len());
                        let matches: Vec<_> = hits.matches[match_window.range()]
                            .iter()
                            .map(|raw| stitch::to_match(&hits, raw, before, after, max_chars))
                            .collect();
                        more_matches |= match_window.has_more();
                        returned_content |= !matches.is_empty();
                        FileResult {
                            match_count: Some(hits.match_count()),
                            pagination: (match_window.total_pages() > 1)
                                .then(|| match_window.match_block()),
                            path: hits.path,
                            matches,
                            last_modified,
                        }
                    }
                }
            })
            .collect();

        if returned_content {
            warnings.push(BYTE_OFFSET_WARNING.to_string());
        }
        if window.has_more() {
            hints.push(format!(
                "More files available: request filePageNumber={} ({} of {} pages shown)",
                window.page + 1,
                window.page,
                window.total_pages()
            ));
        }
        if more_matches {
            hints.push(format!(
                "Some files have more matches: request matchPageNumber={}",
                match_page + 1
            ));
        }

        Ok(SearchResult {
            status: SearchStatus::HasResults,
            files: Some(files),
            total_files: Some(total_files),
            total_matches: Some(total_matches),
            pagination: Some(window.file_block()),
            warnings: std::mem::take(warnings),
            hints,
            error_code: None,
            error: None,
        })
    }

    async fn run_list(
        &self,
        mut query: FileListQuery,
        warnings: &mut Vec<String>,
    ) -> Result<FileListResult, SearchError> {
        let config = &*self.config;

        if query.entry_page_number == Some(0) || query.entries_per_page == Some(0) {
            return Err(SearchError::InvalidQuery {
                reason: "entryPageNumber and entriesPerPage must be at least 1".to_string(),
            });
        }
        if let (Some(min), Some(max)) = (query.min_depth, query.max_depth)
            && min > max
        {
            return Err(SearchError::InvalidQuery {
                reason: format!("minDepth={min} is greater than maxDepth={max}"),
            });
        }
        let explicit = query.entries_per_page.is_some() || query.entry_page_number.is_some();

        let root = self.validate_path(&query.path).await?;
        query.path = root.to_string_lossy().into_owned();

        let cmd = find::build(&query, &config.find_program, self.platform)?;
        warnings.extend(cmd.warnings.iter().cloned());
        log::debug!("Running {cmd}");

        let output = exec::run(&cmd.program, &cmd.args, &self.exec_options()).await?;
        match output.exit_code {
            Some(0) => {}
            // Unreadable subdirectories still leave a useful listing
            Some(_) if reports_timeout(&output.stderr) => {
                return Err(SearchError::Timeout {
                    program: cmd.program.clone(),
                    timeout: config.timeout(),
                });
            }
            Some(code) if !output.stdout.is_empty() => {
                let first = output.stderr.lines().next().unwrap_or_default();
                warnings.push(format!("`{}` exited with {code}: {first}", cmd.program));
            }
            Some(code) => {
                return Err(SearchError::ExecutionFailed {
                    program: cmd.program.clone(),
                    exit_code: Some(code),
                    stderr: output.stderr.trim().to_string(),
                });
            }
            None => {
                return Err(SearchError::Timeout {
                    program: cmd.program.clone(),
                    timeout: config.timeout(),
                });
            }
        }

        let min_depth = query.min_depth.unwrap_or(0) as usize;
        let paths: Vec<String> = text::parse_path_list(&output.stdout)
            .files
            .into_iter()
            .map(|f| f.path)
            .filter(|p| depth_below(&root, p) >= min_depth)
            .collect();

        let sort = query.sort_by.unwrap_or(SortBy::Path);
        let times = if sort == SortBy::Modified {
            metadata::modified_times(paths.iter().map(String::as_str)).await
        } else {
            vec![None; paths.len()]
        };
        let mut ranked: Vec<Ranked<()>> = paths
            .into_iter()
            .zip(times)
            .map(|(path, modified)| Ranked {
                path,
                modified,
                item: (),
            })
            .collect();
        sorting::sort_files(&mut ranked, sort, sorting::default_direction(sort));

        let total = ranked.len();
        governor::check_entries(total, explicit, config)?;
        if total == 0 {
            return Ok(FileListResult {
                status: SearchStatus::Empty,
                entries: Some(Vec::new()),
                total_entries: Some(0),
                pagination: None,
                warnings: std::mem::take(warnings),
                hints: Vec::new(),
                error_code: None,
                error: None,
            });
        }

        let window = PageWindow::new(
            query.entry_page_number.unwrap_or(1),
            query.entries_per_page.unwrap_or(config.default_entries_per_page),
            total,
        );
        if window.is_out_of_range() {
            warnings.push(format!(
                "entryPageNumber={} is past the last page ({})",
                window.page,
                window.total_pages()
            ));
        }
        let mut page = window.slice(ranked);

        if query.show_last_modified && sort != SortBy::Modified {
            let times = metadata::modified_times(page.iter().map(|r| r.path.as_str())).await;
            for (entry, modified) in page.iter_mut().zip(times) {
                entry.modified = modified;
            }
        }

        let entries = page
            .into_iter()
            .map(|entry| FileEntry {
                last_modified: if query.show_last_modified {
                    entry.modified.map(metadata::iso8601)
                } else {
                    None
                },
                path: entry.path,
            })
            .collect();

        let mut hints = Vec::new();
        if window.has_more() {
            hints.push(format!(
                "More entries available: request entryPageNumber={}",
                window.page + 1
            ));
        }

        Ok(FileListResult {
            status: SearchStatus::HasResults,
            entries: Some(entries),
            total_entries: Some(total),
            pagination: Some(window.entry_block()),
            warnings: std::mem::take(warnings),
            hints,
            error_code: None,
            error: None,
        })
    }
}

/// Decode stdout according to backend and output mode
fn parse_output(query: &SearchQuery, backend: Backend, stdout: &[u8]) -> ParsedOutput {
    match (query.output_mode(), backend) {
        (OutputMode::FilesOnly | OutputMode::FilesWithoutMatch, _) => text::parse_path_list(stdout),
        (OutputMode::Count, _) => text::parse_counts(stdout),
        (OutputMode::Normal, Backend::Primary) => json::parse(stdout),
        (OutputMode::Normal, Backend::Fallback) => {
            text::parse_grep_lines(stdout, &ColumnLocator::for_query(query))
        }
    }
}

fn reports_timeout(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    TIMEOUT_MARKERS.iter().any(|marker| stderr.contains(marker))
}

/// Path components of `path` below `root`
fn depth_below(root: &Path, path: &str) -> usize {
    Path::new(path)
        .strip_prefix(root)
        .map_or(0, |rel| rel.components().count())
}
