use serde::{Deserialize, Serialize};

/// A page of results expressed as a skip count and a size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub limit: usize,
    pub offset: usize,
}

impl PageWindow {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    /// Builds a window from a 1-based page number, clamping the size to
    /// `[1, max_limit]` and the page to at least 1.
    pub fn from_page(page: Option<u32>, limit: Option<u32>, default_limit: u32, max_limit: u32) -> Self {
        let max_limit = max_limit.max(1);
        let limit = limit.unwrap_or(default_limit).clamp(1, max_limit) as usize;
        let page = page.unwrap_or(1).max(1) as usize;

        Self {
            limit,
            offset: (page - 1) * limit,
        }
    }

    /// Number of items that must be collected before this page can be cut
    pub fn target(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }

    /// 1-based page number this window corresponds to
    pub fn page(&self) -> usize {
        if self.limit == 0 {
            1
        } else {
            self.offset / self.limit + 1
        }
    }

    /// Cuts this window out of an ordered list; past the end yields an empty page
    pub fn slice<T>(&self, mut items: Vec<T>) -> Vec<T> {
        if self.offset >= items.len() {
            return Vec::new();
        }
        items.truncate(self.target().min(items.len()));
        items.split_off(self.offset)
    }
}
