// Accounts and profiles
pub mod accounts;
pub mod directory;
pub mod employees;
pub mod schedule;
pub mod users;

// Catalog and inventory
pub mod products;
pub mod stock_history;
pub mod uploads;

// Order workflow
pub mod invoicing;
pub mod messages;
pub mod orders;
pub mod ratings;

// Administration and reporting
pub mod analytics;
pub mod audit;
pub mod bug_reports;

use serde::Serialize;

pub const DEFAULT_PAGE_LIMIT: u64 = 50;
pub const MAX_PAGE_LIMIT: u64 = 100;

/// Clamps 1-based page parameters: page defaults to 1, limit to 50, and an
/// out-of-range limit falls back to the default.
pub fn page_window(page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
    let page = page.filter(|p| *p >= 1).unwrap_or(1);
    let limit = limit
        .filter(|l| (1..=MAX_PAGE_LIMIT).contains(l))
        .unwrap_or(DEFAULT_PAGE_LIMIT);
    (page, limit)
}

/// Standard pagination response metadata
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        Self {
            page,
            limit,
            total,
            pages: total.div_ceil(limit.max(1)),
        }
    }
}

/// Standard paginated response wrapper
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, page: u64, limit: u64, total: u64) -> Self {
        Self {
            data,
            pagination: Pagination::new(page, limit, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_defaults_and_clamps() {
        assert_eq!(page_window(None, None), (1, 50));
        assert_eq!(page_window(Some(0), Some(0)), (1, 50));
        assert_eq!(page_window(Some(3), Some(100)), (3, 100));
        assert_eq!(page_window(Some(2), Some(500)), (2, 50));
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(Pagination::new(1, 50, 0).pages, 0);
        assert_eq!(Pagination::new(1, 50, 50).pages, 1);
        assert_eq!(Pagination::new(1, 50, 51).pages, 2);
    }
}
