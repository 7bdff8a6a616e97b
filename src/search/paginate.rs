//! Two-level pagination: files first, then matches within each returned file

use super::types::{MatchPagination, Pagination};

/// One page cut out of a list of `total` items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub per_page: u32,
    pub total: usize,
}

impl PageWindow {
    /// `page` and `per_page` are 1-based and non-zero after validation;
    /// zero is treated as one.
    #[must_use]
    pub fn new(page: u32, per_page: u32, total: usize) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
            total,
        }
    }

    #[must_use]
    pub fn total_pages(&self) -> u32 {
        let pages = self.total.div_ceil(self.per_page as usize);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    fn start(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.per_page as usize)
    }

    /// True iff `page * per_page < total`
    #[must_use]
    pub fn has_more(&self) -> bool {
        (self.page as usize).saturating_mul(self.per_page as usize) < self.total
    }

    /// True when the requested page starts past the end of a non-empty list
    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        self.total > 0 && self.start() >= self.total
    }

    #[must_use]
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.start().min(self.total);
        let end = start.saturating_add(self.per_page as usize).min(self.total);
        start..end
    }

    /// Take this page's items out of `items`
    #[must_use]
    pub fn slice<T>(&self, mut items: Vec<T>) -> Vec<T> {
        let range = self.range();
        items.truncate(range.end);
        items.drain(..range.start);
        items
    }

    #[must_use]
    pub fn file_block(&self) -> Pagination {
        Pagination {
            current_page: self.page,
            total_pages: self.total_pages(),
            files_per_page: Some(self.per_page),
            total_files: Some(self.total),
            entries_per_page: None,
            total_entries: None,
            has_more: self.has_more(),
        }
    }

    #[must_use]
    pub fn entry_block(&self) -> Pagination {
        Pagination {
            current_page: self.page,
            total_pages: self.total_pages(),
            files_per_page: None,
            total_files: None,
            entries_per_page: Some(self.per_page),
            total_entries: Some(self.total),
            has_more: self.has_more(),
        }
    }

    #[must_use]
    pub fn match_block(&self) -> MatchPagination {
        MatchPagination {
            current_page: self.page,
            total_pages: self.total_pages(),
            has_more: self.has_more(),
        }
    }
}

/// Stage A: apply the global file cap. Returns whether capping happened.
pub fn cap<T>(items: &mut Vec<T>, max: Option<u32>) -> bool {
    match max {
        Some(max) if items.len() > max as usize => {
            items.truncate(max as usize);
            true
        }
        _ => false,
    }
}
