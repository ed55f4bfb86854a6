//! This module defines the common functionality for paging data.

/// The config for pagination.
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of expenses per page when not specified in a request.
    pub default_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 10,
        }
    }
}

/// The number of pages needed to show `total` records at `limit` records per page.
///
/// Zero records means zero pages; otherwise this is `total / limit` rounded up.
/// `limit` must be at least one, callers should clamp it before calling.
pub fn page_count(total: u64, limit: u64) -> u64 {
    total.div_ceil(limit)
}

#[cfg(test)]
mod page_count_tests {
    use super::page_count;

    #[test]
    fn zero_records_means_zero_pages() {
        assert_eq!(page_count(0, 10), 0);
    }

    #[test]
    fn exact_multiple() {
        assert_eq!(page_count(20, 10), 2);
    }

    #[test]
    fn partial_last_page_rounds_up() {
        assert_eq!(page_count(23, 10), 3);
    }

    #[test]
    fn single_record_is_one_page() {
        assert_eq!(page_count(1, 10), 1);
    }
}
