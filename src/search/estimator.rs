//! Cheap size estimate of a search target
//!
//! Root-level files are measured exactly. Up to `MAX_SAMPLED_SUBDIRS`
//! non-hidden subdirectories are listed one level deep and extrapolated
//! with a fixed average file size. The estimate never fails: any I/O error
//! yields a zeroed, not-large result.

use std::path::{Path, PathBuf};

use futures::future::join_all;
use tokio::fs;

use super::types::DirectoryStats;
use crate::config::SearchConfig;

const MAX_SAMPLED_SUBDIRS: usize = 20;
const AVERAGE_FILE_SIZE_BYTES: u64 = 50 * 1024;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Estimate the size of `path` against the configured thresholds
pub async fn estimate(path: &Path, config: &SearchConfig) -> DirectoryStats {
    match sample(path).await {
        Ok((bytes, files)) => {
            let estimated_size_mb = bytes as f64 / BYTES_PER_MB;
            DirectoryStats {
                estimated_size_mb,
                estimated_file_count: files,
                is_large: estimated_size_mb > config.large_directory_mb
                    || files > config.large_directory_files,
            }
        }
        Err(e) => {
            log::debug!("Size estimate for {} unavailable: {e}", path.display());
            DirectoryStats::default()
        }
    }
}

async fn sample(path: &Path) -> std::io::Result<(u64, u64)> {
    let meta = fs::metadata(path).await?;
    if meta.is_file() {
        return Ok((meta.len(), 1));
    }

    let mut bytes = 0u64;
    let mut files = 0u64;
    let mut subdirs: Vec<PathBuf> = Vec::new();

    let mut entries = fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_type = match entry.file_type().await {
            Ok(ft) => ft,
            Err(e) => {
                log::debug!("Skipping {} while estimating: {e}", entry.path().display());
                continue;
            }
        };
        if file_type.is_file() {
            files += 1;
            if let Ok(meta) = entry.metadata().await {
                bytes += meta.len();
            }
        } else if file_type.is_dir()
            && subdirs.len() < MAX_SAMPLED_SUBDIRS
            && !entry.file_name().to_string_lossy().starts_with('.')
        {
            subdirs.push(entry.path());
        }
    }

    let counts = join_all(subdirs.iter().map(|dir| count_entries(dir))).await;
    let sub_files: u64 = counts.into_iter().sum();

    Ok((
        bytes.saturating_add(sub_files.saturating_mul(AVERAGE_FILE_SIZE_BYTES)),
        files + sub_files,
    ))
}

/// Immediate entries of `dir`; unreadable directories count as empty
async fn count_entries(dir: &Path) -> u64 {
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return 0;
    };
    let mut count = 0;
    while let Ok(Some(_)) = entries.next_entry().await {
        count += 1;
    }
    count
}
