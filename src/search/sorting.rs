//! Ordering for file-level results
//!
//! Files are ordered by path (ascending) unless modification time is
//! requested, in which case newest files come first. Equal or missing
//! timestamps fall back to path order so every ordering is total and
//! pagination stays deterministic across calls.

use std::cmp::Ordering;
use std::time::SystemTime;

use super::types::{SortBy, SortDirection};

/// Anything that can be placed in a sorted file list
pub trait SortKey {
    fn sort_path(&self) -> &str;
    fn sort_modified(&self) -> Option<SystemTime>;
}

/// Direction used when the caller names a key but no direction
#[must_use]
pub fn default_direction(sort_by: SortBy) -> SortDirection {
    match sort_by {
        SortBy::Path => SortDirection::Ascending,
        SortBy::Modified => SortDirection::Descending,
    }
}

/// Sort in place by `sort_by` and `direction`
///
/// Entries without a timestamp are placed after all timestamped entries in
/// both directions.
pub fn sort_files<T: SortKey>(items: &mut [T], sort_by: SortBy, direction: SortDirection) {
    items.sort_by(|a, b| {
        let ordering = match sort_by {
            SortBy::Path => directed(compare_paths(a.sort_path(), b.sort_path()), direction),
            SortBy::Modified => compare_optional_times(a.sort_modified(), b.sort_modified(), direction),
        };
        ordering.then_with(|| compare_paths(a.sort_path(), b.sort_path()))
    });
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

fn compare_paths(a: &str, b: &str) -> Ordering {
    a.cmp(b)
}

/// Missing timestamps always go last
fn compare_optional_times(
    a: Option<SystemTime>,
    b: Option<SystemTime>,
    direction: SortDirection,
) -> Ordering {
    match (a, b) {
        (Some(a_time), Some(b_time)) => directed(a_time.cmp(&b_time), direction),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
