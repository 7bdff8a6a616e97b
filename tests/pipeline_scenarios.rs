//! End-to-end pipeline scenarios against scripted backends
//!
//! The primary backend is replaced by a small shell script that prints a
//! canned ripgrep JSON stream (or misbehaves on purpose), so pagination,
//! governor and process-limit behavior is exercised without ripgrep.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::{Duration, Instant, UNIX_EPOCH};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Mutex;

use kodegen_tools_local_search::search::command::Platform;
use kodegen_tools_local_search::search::{SortBy, SortDirection};
use kodegen_tools_local_search::{
    AllowListValidator, BackendProbe, CommandAvailability, LocalSearch, SearchConfig, SearchQuery,
    SearchStatus,
};

static INIT: Once = Once::new();

// Scripts are written and then executed; serializing the tests keeps a
// concurrent fork from holding a script open for writing (ETXTBSY).
static SERIAL: Mutex<()> = Mutex::const_new(());

fn init_logging() {
    INIT.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .is_test(true)
            .init();
    });
}

/// Reports exactly the listed programs as installed
struct StubProbe(Vec<String>);

#[async_trait]
impl BackendProbe for StubProbe {
    async fn probe(&self, program: &str) -> CommandAvailability {
        CommandAvailability {
            available: self.0.iter().any(|p| p == program),
        }
    }
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        init_logging();
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    fn root(&self) -> String {
        self.dir
            .path()
            .canonicalize()
            .expect("canonical root")
            .to_string_lossy()
            .into_owned()
    }

    fn file(&self, name: &str) -> String {
        format!("{}/{name}", self.root())
    }

    /// Create `name` with its modification time at `secs` past the epoch
    fn touch(&self, name: &str, secs: u64) {
        let file = std::fs::File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.path().join(name))
            .expect("open file");
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs))
            .expect("set mtime");
    }

    /// Write an executable script and return its path
    fn script(&self, name: &str, body: &str) -> String {
        let path: PathBuf = self.dir.path().join(format!(".{name}"));
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        let mut perms = std::fs::metadata(&path).expect("stat script").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod script");
        path.to_string_lossy().into_owned()
    }

    /// Script that prints `stdout` verbatim
    fn canned(&self, stdout: &str) -> String {
        let data = self.dir.path().join(".canned.out");
        std::fs::write(&data, stdout).expect("write canned output");
        self.script("backend", &format!("cat '{}'", data.display()))
    }

    fn engine(&self, primary: &str, tweak: impl FnOnce(&mut SearchConfig)) -> LocalSearch {
        let mut config = SearchConfig {
            primary_program: primary.to_string(),
            fallback_program: "no-such-fallback".to_string(),
            ..SearchConfig::default()
        };
        tweak(&mut config);
        LocalSearch::with_collaborators(
            config,
            Arc::new(AllowListValidator::default()),
            Arc::new(StubProbe(vec![primary.to_string()])),
        )
    }

    fn query(&self, pattern: &str) -> SearchQuery {
        SearchQuery::new(pattern, self.root())
    }
}

fn match_event(path: &str, line: u64, text: &str, start: usize, end: usize) -> String {
    serde_json::json!({
        "type": "match",
        "data": {
            "path": {"text": path},
            "lines": {"text": format!("{text}\n")},
            "line_number": line,
            "absolute_offset": line * 100,
            "submatches": [{"match": {"text": &text[start..end]}, "start": start, "end": end}]
        }
    })
    .to_string()
}

/// One match per line for each `(file, match count)`
fn json_stream(fx: &Fixture, files: &[(&str, u64)]) -> String {
    let mut lines = Vec::new();
    for (name, count) in files {
        let path = fx.file(name);
        lines.push(format!(r#"{{"type":"begin","data":{{"path":{{"text":"{path}"}}}}}}"#));
        for line in 1..=*count {
            lines.push(match_event(&path, line, "let needle = 1;", 4, 10));
        }
        lines.push(format!(r#"{{"type":"end","data":{{"path":{{"text":"{path}"}},"stats":{{}}}}}}"#));
    }
    lines.join("\n") + "\n"
}

#[tokio::test]
async fn test_two_level_pagination_scenario() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let backend = fx.canned(&json_stream(&fx, &[("c.rs", 1), ("a.rs", 2), ("b.rs", 5)]));
    let search = fx.engine(&backend, |_| {});

    let mut query = fx.query("needle");
    query.matches_per_page = Some(3);
    query.files_per_page = Some(2);
    let result = search.search(query).await;

    assert_eq!(result.status, SearchStatus::HasResults, "{result:?}");
    assert_eq!(result.total_files, Some(3));
    assert_eq!(result.total_matches, Some(8));

    let files = result.files.expect("files");
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].path, fx.file("a.rs"));
    assert_eq!(files[0].matches.len(), 2);
    assert!(files[0].pagination.is_none());

    assert_eq!(files[1].path, fx.file("b.rs"));
    assert_eq!(files[1].match_count, Some(5));
    assert_eq!(files[1].matches.len(), 3);
    let block = files[1].pagination.expect("b.rs is truncated");
    assert!(block.has_more);
    assert_eq!(block.total_pages, 2);

    let pagination = result.pagination.expect("file pagination");
    assert!(pagination.has_more);
    assert_eq!(pagination.total_pages, 2);
    assert!(result.warnings.iter().any(|w| w.contains("byte offsets")));
    assert!(result.hints.iter().any(|h| h.contains("matchPageNumber=2")));
    assert!(result.hints.iter().any(|h| h.contains("filePageNumber=2")));
}

#[tokio::test]
async fn test_second_match_page() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let backend = fx.canned(&json_stream(&fx, &[("c.rs", 1), ("a.rs", 2), ("b.rs", 5)]));
    let search = fx.engine(&backend, |_| {});

    let mut query = fx.query("needle");
    query.matches_per_page = Some(3);
    query.files_per_page = Some(2);
    query.match_page_number = Some(2);
    let result = search.search(query).await;

    assert_eq!(result.total_files, Some(3));
    assert_eq!(result.total_matches, Some(8));
    let files = result.files.expect("files");

    // a.rs fits on one match page, so page two is empty
    assert_eq!(files[0].path, fx.file("a.rs"));
    assert_eq!(files[0].match_count, Some(2));
    assert!(files[0].matches.is_empty());
    assert!(files[0].pagination.is_none());

    assert_eq!(files[1].path, fx.file("b.rs"));
    let lines: Vec<u64> = files[1].matches.iter().map(|m| m.line).collect();
    assert_eq!(lines, vec![4, 5]);
    let block = files[1].pagination.expect("b.rs spans two match pages");
    assert_eq!(block.current_page, 2);
    assert_eq!(block.total_pages, 2);
    assert!(!block.has_more);
    assert!(!result.hints.iter().any(|h| h.contains("matchPageNumber")));
}

#[tokio::test]
async fn test_sort_by_modified_breaks_ties_on_path() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    fx.touch("a.rs", 1_700_000_000);
    fx.touch("b.rs", 1_700_000_300);
    fx.touch("c.rs", 1_700_000_000);
    let backend = fx.canned(&json_stream(&fx, &[("c.rs", 1), ("a.rs", 1), ("b.rs", 1)]));
    let search = fx.engine(&backend, |_| {});

    let mut newest = fx.query("needle");
    newest.sort = Some(SortBy::Modified);
    let files = search.search(newest).await.files.expect("files");
    let paths: Vec<String> = files.into_iter().map(|f| f.path).collect();
    assert_eq!(paths, vec![fx.file("b.rs"), fx.file("a.rs"), fx.file("c.rs")]);

    let mut oldest = fx.query("needle");
    oldest.sort = Some(SortBy::Modified);
    oldest.sort_direction = Some(SortDirection::Ascending);
    let files = search.search(oldest).await.files.expect("files");
    let paths: Vec<String> = files.into_iter().map(|f| f.path).collect();
    assert_eq!(paths, vec![fx.file("a.rs"), fx.file("c.rs"), fx.file("b.rs")]);
}

#[tokio::test]
async fn test_show_file_last_modified_sorts_newest_first() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    fx.touch("a.rs", 1_700_000_000);
    fx.touch("b.rs", 1_700_000_300);
    let backend = fx.canned(&json_stream(&fx, &[("a.rs", 1), ("b.rs", 1)]));
    let search = fx.engine(&backend, |_| {});

    let mut query = fx.query("needle");
    query.show_file_last_modified = true;
    let files = search.search(query).await.files.expect("files");

    assert_eq!(files[0].path, fx.file("b.rs"));
    assert_eq!(files[0].last_modified.as_deref(), Some("2023-11-14T22:18:20Z"));
    assert_eq!(files[1].path, fx.file("a.rs"));
    assert_eq!(files[1].last_modified.as_deref(), Some("2023-11-14T22:13:20Z"));
}

#[tokio::test]
async fn test_last_modified_on_path_sorted_page() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    fx.touch("a.rs", 1_700_000_000);
    fx.touch("b.rs", 1_700_000_300);
    let backend = fx.canned(&json_stream(&fx, &[("b.rs", 1), ("a.rs", 1), ("gone.rs", 1)]));
    let search = fx.engine(&backend, |_| {});

    let mut query = fx.query("needle");
    query.show_file_last_modified = true;
    query.sort = Some(SortBy::Path);
    let files = search.search(query).await.files.expect("files");

    let paths: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
    assert_eq!(paths, vec![fx.file("a.rs"), fx.file("b.rs"), fx.file("gone.rs")]);
    assert_eq!(files[0].last_modified.as_deref(), Some("2023-11-14T22:13:20Z"));
    assert_eq!(files[1].last_modified.as_deref(), Some("2023-11-14T22:18:20Z"));
    // A file deleted after the search has no timestamp
    assert!(files[2].last_modified.is_none());
}

#[tokio::test]
async fn test_timeout_marker_on_stderr() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let backend = fx.script("backend", "echo 'search timed out' >&2; exit 2");
    let result = fx.engine(&backend, |_| {}).search(fx.query("needle")).await;

    assert_eq!(result.error_code.as_deref(), Some("TIMEOUT"));
    assert!(result.hints.iter().any(|h| h.contains("Narrow the search path")));
}

#[tokio::test]
async fn test_max_files_cap_scenario() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let names: Vec<String> = (0..50).map(|i| format!("f{i:02}.rs")).collect();
    let files: Vec<(&str, u64)> = names.iter().map(|n| (n.as_str(), 1)).collect();
    let backend = fx.canned(&json_stream(&fx, &files));
    let search = fx.engine(&backend, |_| {});

    let mut query = fx.query("needle");
    query.max_files = Some(10);
    let result = search.search(query).await;

    assert_eq!(result.total_files, Some(10));
    assert_eq!(result.total_matches, Some(10));
    assert_eq!(result.files.as_ref().map(Vec::len), Some(10));
    assert!(result.hints.iter().any(|h| h.contains("Results limited")));
}

#[tokio::test]
async fn test_pages_reconstruct_capped_list_with_stable_totals() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let names: Vec<String> = (0..23).map(|i| format!("m{i:02}.rs")).collect();
    let files: Vec<(&str, u64)> = names.iter().map(|n| (n.as_str(), 2)).collect();
    let backend = fx.canned(&json_stream(&fx, &files));
    let search = fx.engine(&backend, |_| {});

    let mut seen = Vec::new();
    let mut page = 1;
    loop {
        let mut query = fx.query("needle");
        query.files_per_page = Some(5);
        query.file_page_number = Some(page);
        let result = search.search(query).await;
        assert_eq!(result.total_files, Some(23));
        assert_eq!(result.total_matches, Some(46));

        let pagination = result.pagination.expect("pagination");
        assert_eq!(pagination.has_more, page * 5 < 23);
        seen.extend(result.files.expect("files").into_iter().map(|f| f.path));
        if !pagination.has_more {
            assert_eq!(page, pagination.total_pages);
            break;
        }
        page += 1;
    }

    let expected: Vec<String> = names.iter().map(|n| fx.file(n)).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_malformed_line_is_skipped_end_to_end() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let path = fx.file("a.rs");
    let mut lines: Vec<String> = (1..=10)
        .map(|n| match_event(&path, n, "let needle = 1;", 4, 10))
        .collect();
    lines[3] = "{not json".to_string();
    let backend = fx.canned(&(lines.join("\n") + "\n"));
    let search = fx.engine(&backend, |_| {});

    let mut query = fx.query("needle");
    query.matches_per_page = Some(100);
    let result = search.search(query).await;

    assert_eq!(result.status, SearchStatus::HasResults);
    assert_eq!(result.total_matches, Some(9));
}

#[tokio::test]
async fn test_exit_one_with_empty_stdout_is_empty() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let backend = fx.script("backend", "exit 1");
    let result = fx.engine(&backend, |_| {}).search(fx.query("needle")).await;

    assert_eq!(result.status, SearchStatus::Empty);
    assert_eq!(result.total_files, Some(0));
    assert!(result.error_code.is_none());
}

#[tokio::test]
async fn test_exit_two_is_execution_failure_with_stderr() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let backend = fx.script("backend", "echo 'regex parse error' >&2; exit 2");
    let result = fx.engine(&backend, |_| {}).search(fx.query("needle")).await;

    assert_eq!(result.status, SearchStatus::Error);
    assert_eq!(result.error_code.as_deref(), Some("EXECUTION_FAILED"));
    assert!(result.error.unwrap_or_default().contains("regex parse error"));
}

#[tokio::test]
async fn test_stdout_flood_is_killed_with_output_error() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let backend = fx.script("backend", r#"exec yes '{"type":"summary","data":{"stats":{}}}'"#);
    let search = fx.engine(&backend, |c| {
        c.max_stdout_bytes = 64 * 1024;
        c.timeout_ms = 20_000;
    });

    let start = Instant::now();
    let result = search.search(fx.query("needle")).await;

    assert_eq!(result.error_code.as_deref(), Some("OUTPUT_TOO_LARGE"));
    assert!(result.hints.iter().any(|h| h.contains("node_modules")));
    // `yes` never exits by itself; returning early means it was killed
    assert!(start.elapsed() < Duration::from_secs(15));
}

#[tokio::test]
async fn test_timeout_reports_bound() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let backend = fx.script("backend", "exec sleep 30");
    let search = fx.engine(&backend, |c| c.timeout_ms = 300);

    let result = search.search(fx.query("needle")).await;
    assert_eq!(result.error_code.as_deref(), Some("TIMEOUT"));
    assert!(result.error.unwrap_or_default().contains("300ms"));
}

#[tokio::test]
async fn test_governor_requires_pagination_for_wide_results() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let names: Vec<String> = (0..250).map(|i| format!("g{i:03}.rs")).collect();
    let files: Vec<(&str, u64)> = names.iter().map(|n| (n.as_str(), 1)).collect();
    let backend = fx.canned(&json_stream(&fx, &files));
    let search = fx.engine(&backend, |_| {});

    let rejected = search.search(fx.query("needle")).await;
    assert_eq!(rejected.error_code.as_deref(), Some("RESULTS_TOO_LARGE"));
    assert!(rejected.hints.iter().any(|h| h.contains("filesPerPage=10")));

    let mut paged = fx.query("needle");
    paged.files_per_page = Some(25);
    let accepted = search.search(paged).await;
    assert_eq!(accepted.total_files, Some(250));
    assert_eq!(accepted.files.map(|f| f.len()), Some(25));
}

#[tokio::test]
async fn test_fallback_rejects_primary_only_feature() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let search = LocalSearch::with_collaborators(
        SearchConfig::default(),
        Arc::new(AllowListValidator::default()),
        Arc::new(StubProbe(vec!["grep".to_string()])),
    );

    let mut query = fx.query("foo.*bar");
    query.multiline = true;
    let result = search.search(query).await;

    assert_eq!(
        result.error_code.as_deref(),
        Some("FEATURE_REQUIRES_PRIMARY_BACKEND")
    );
    assert!(result.error.unwrap_or_default().contains("multiline"));
    assert!(result.warnings.iter().any(|w| w.contains("not available")));
}

#[tokio::test]
async fn test_scripted_bsd_grep_fallback() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let path = fx.file("a.rs");
    let stdout = format!("{path}\u{0}1-0-fn main() {{\n{path}\u{0}2:12:    needle();\n");
    let grep = fx.canned(&stdout);

    let config = SearchConfig {
        primary_program: "no-such-primary".to_string(),
        fallback_program: grep.clone(),
        ..SearchConfig::default()
    };
    let search = LocalSearch::with_collaborators(
        config,
        Arc::new(AllowListValidator::default()),
        Arc::new(StubProbe(vec![grep])),
    )
    .with_platform(Platform::MacOs);

    let mut query = fx.query("needle");
    query.before_lines = Some(1);
    let result = search.search(query).await;

    assert_eq!(result.status, SearchStatus::HasResults, "{result:?}");
    assert!(result.warnings.iter().any(|w| w.contains("not available")));
    assert!(result.warnings.iter().any(|w| w.contains("BSD grep")));

    let files = result.files.expect("files");
    let hit = &files[0].matches[0];
    assert_eq!(hit.line, 2);
    assert_eq!(hit.column, 4);
    assert_eq!(hit.location.byte_offset, 16);
    assert_eq!(hit.value, "fn main() {\n    needle();");
}

#[tokio::test]
async fn test_no_backend_installed() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let search = LocalSearch::with_collaborators(
        SearchConfig::default(),
        Arc::new(AllowListValidator::default()),
        Arc::new(StubProbe(Vec::new())),
    );
    let result = search.search(fx.query("x")).await;
    assert_eq!(result.error_code.as_deref(), Some("BACKEND_UNAVAILABLE"));
    assert!(result.hints.iter().any(|h| h.contains("ripgrep")));
}

#[tokio::test]
async fn test_path_outside_allowed_roots_is_rejected() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let allowed = TempDir::new().expect("temp dir");
    let search = LocalSearch::with_collaborators(
        SearchConfig::default(),
        Arc::new(AllowListValidator::new(&[allowed.path().to_path_buf()], &[])),
        Arc::new(StubProbe(vec!["rg".to_string()])),
    );
    let result = search.search(fx.query("x")).await;
    assert_eq!(result.error_code.as_deref(), Some("PATH_REJECTED"));
}

#[tokio::test]
async fn test_invalid_query_spawns_nothing() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let marker = fx.dir.path().join("spawned");
    let backend = fx.script("backend", &format!("touch '{}'", marker.display()));
    let search = fx.engine(&backend, |_| {});

    let mut query = fx.query("x");
    query.files_only = true;
    query.count = true;
    let result = search.search(query).await;

    assert_eq!(result.error_code.as_deref(), Some("INVALID_QUERY"));
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_batch_keeps_order_and_caps_size() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let backend = fx.canned(&json_stream(&fx, &[("a.rs", 1)]));
    let search = fx.engine(&backend, |c| c.max_batch_queries = 3);

    let mut queries: Vec<SearchQuery> = (0..5).map(|_| fx.query("needle")).collect();
    queries[1].pattern = String::new();
    let results = search.search_batch(queries).await;

    assert_eq!(results.len(), 5);
    assert_eq!(results[0].status, SearchStatus::HasResults);
    assert_eq!(results[1].error_code.as_deref(), Some("INVALID_QUERY"));
    assert_eq!(results[2].status, SearchStatus::HasResults);
    for skipped in &results[3..] {
        assert_eq!(skipped.error_code.as_deref(), Some("INVALID_QUERY"));
        assert!(skipped.error.as_deref().unwrap_or_default().contains("at most 3"));
    }
}

#[tokio::test]
async fn test_files_only_mode_returns_paths_without_matches() {
    let _serial = SERIAL.lock().await;
    let fx = Fixture::new();
    let stdout = format!("{}\0{}\0", fx.file("b.rs"), fx.file("a.rs"));
    let backend = fx.canned(&stdout);
    let search = fx.engine(&backend, |_| {});

    let mut query = fx.query("needle");
    query.files_only = true;
    let result = search.search(query).await;

    let files = result.files.expect("files");
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].path, fx.file("a.rs"));
    assert!(files.iter().all(|f| f.matches.is_empty()));
    assert!(!result.warnings.iter().any(|w| w.contains("byte offsets")));
}
