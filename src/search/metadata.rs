//! Last-modified lookups for result files

use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{self, StreamExt};

/// Concurrent stat calls in flight per query
const STAT_CONCURRENCY: usize = 32;

/// Modification times in input order; unreadable files yield `None`
pub async fn modified_times<'a, I>(paths: I) -> Vec<Option<SystemTime>>
where
    I: IntoIterator<Item = &'a str>,
{
    stream::iter(paths)
        .map(|path| async move {
            match tokio::fs::metadata(path).await {
                Ok(meta) => meta.modified().ok(),
                Err(e) => {
                    log::debug!("stat {path} failed: {e}");
                    None
                }
            }
        })
        .buffered(STAT_CONCURRENCY)
        .collect()
        .await
}

/// ISO-8601 UTC timestamp with second precision
#[must_use]
pub fn iso8601(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true)
}
