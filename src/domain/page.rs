//! Paginated list responses.

use serde::{Deserialize, Serialize};

/// Pagination metadata returned with every list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub items_per_page: u32,
}

impl Pagination {
    /// Recompute `total_pages` after `total_items` changed locally.
    fn recount(&mut self) {
        let per_page = u64::from(self.items_per_page.max(1));
        let pages = self.total_items.div_ceil(per_page);
        self.total_pages = u32::try_from(pages).unwrap_or(u32::MAX).max(1);
    }
}

/// One page of a list query: `{ data, pagination }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Build a single page holding all of `data`.
    #[must_use]
    pub fn single(data: Vec<T>) -> Self {
        let len = data.len();
        Self {
            pagination: Pagination {
                current_page: 1,
                total_pages: 1,
                total_items: len as u64,
                items_per_page: u32::try_from(len.max(1)).unwrap_or(u32::MAX),
            },
            data,
        }
    }

    /// True for the first page of a listing.
    #[must_use]
    pub fn is_first(&self) -> bool {
        self.pagination.current_page <= 1
    }

    /// Find an item by predicate.
    pub fn find_mut(&mut self, pred: impl Fn(&T) -> bool) -> Option<&mut T> {
        self.data.iter_mut().find(|item| pred(item))
    }

    /// True if any item matches.
    pub fn contains(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.data.iter().any(pred)
    }

    /// Insert at the head, keeping the page at most `items_per_page` long.
    pub fn push_front(&mut self, item: T) {
        self.insert_at(0, item);
    }

    /// Insert at `index`, clamped to the current length, keeping the page at
    /// most `items_per_page` long.
    pub fn insert_at(&mut self, index: usize, item: T) {
        let index = index.min(self.data.len());
        self.data.insert(index, item);
        let limit = self.pagination.items_per_page.max(1) as usize;
        self.data.truncate(limit);
        self.pagination.total_items += 1;
        self.pagination.recount();
    }

    /// Remove every matching item. Returns true if something was removed.
    pub fn remove(&mut self, pred: impl Fn(&T) -> bool) -> bool {
        let before = self.data.len();
        self.data.retain(|item| !pred(item));
        let removed = (before - self.data.len()) as u64;
        if removed == 0 {
            return false;
        }
        self.pagination.total_items = self.pagination.total_items.saturating_sub(removed);
        self.pagination.recount();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(items: Vec<u32>, per_page: u32, total: u64) -> Page<u32> {
        Page {
            data: items,
            pagination: Pagination {
                current_page: 1,
                total_pages: 1,
                total_items: total,
                items_per_page: per_page,
            },
        }
    }

    #[test]
    fn test_push_front_truncates_and_recounts() {
        let mut p = page(vec![1, 2, 3], 3, 3);
        p.push_front(0);
        assert_eq!(p.data, vec![0, 1, 2]);
        assert_eq!(p.pagination.total_items, 4);
        assert_eq!(p.pagination.total_pages, 2);
    }

    #[test]
    fn test_insert_at_clamps_and_recounts() {
        let mut p = page(vec![1, 3], 5, 2);
        p.insert_at(1, 2);
        p.insert_at(9, 4);
        assert_eq!(p.data, vec![1, 2, 3, 4]);
        assert_eq!(p.pagination.total_items, 4);
    }

    #[test]
    fn test_remove_updates_totals() {
        let mut p = page(vec![1, 2, 3], 2, 3);
        assert!(p.remove(|x| *x == 2));
        assert_eq!(p.data, vec![1, 3]);
        assert_eq!(p.pagination.total_items, 2);
        assert_eq!(p.pagination.total_pages, 1);
        assert!(!p.remove(|x| *x == 9));
    }

    #[test]
    fn test_pagination_uses_camel_case() {
        let json = serde_json::to_value(page(vec![], 20, 0)).unwrap();
        assert_eq!(json["pagination"]["itemsPerPage"], 20);
        assert_eq!(json["pagination"]["totalItems"], 0);
    }
}
