//! Pagination
//!
//! `Pagination` renders LIMIT/OFFSET fragments; `PaginationMetadata` is the
//! pure arithmetic over `(page, per_page, total)` returned alongside paged
//! data. No I/O happens here — the query builder first runs the count query
//! (reusing where/join, dropping group/order/limit/offset) and then the
//! paged data query.

/// LIMIT/OFFSET fragment
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Pagination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn to_sql(&self) -> String {
        let mut clauses = Vec::new();
        if let Some(limit) = self.limit {
            clauses.push(format!("LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            clauses.push(format!("OFFSET {}", offset));
        }
        clauses.join(" ")
    }
}

/// Page arithmetic for a paginated fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationMetadata {
    pub first_page: u64,
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub is_empty: bool,
    pub last_page: u64,
    pub has_more_pages: bool,
    pub has_pages: bool,
}

pub fn get_pagination_metadata(page: u64, per_page: u64, total: u64) -> PaginationMetadata {
    let per_page = per_page.max(1);
    let last_page = (total.div_ceil(per_page)).max(1);
    PaginationMetadata {
        first_page: 1,
        current_page: page,
        per_page,
        total,
        is_empty: total == 0,
        last_page,
        has_more_pages: page < last_page,
        has_pages: total > per_page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_result_set() {
        let meta = get_pagination_metadata(1, 10, 0);
        assert!(meta.is_empty);
        assert_eq!(meta.last_page, 1);
        assert!(!meta.has_more_pages);
        assert!(!meta.has_pages);
    }

    #[test]
    fn test_partial_last_page() {
        let meta = get_pagination_metadata(1, 10, 25);
        assert_eq!(meta.last_page, 3);
        assert!(meta.has_more_pages);
        assert!(meta.has_pages);
    }

    #[test]
    fn test_final_page_has_no_more() {
        let meta = get_pagination_metadata(3, 10, 25);
        assert!(!meta.has_more_pages);
        assert_eq!(meta.current_page, 3);
    }

    #[test]
    fn test_exact_multiple() {
        let meta = get_pagination_metadata(1, 5, 10);
        assert_eq!(meta.last_page, 2);
        assert!(meta.has_pages);
    }

    #[test]
    fn test_limit_offset_sql() {
        let pagination = Pagination::new().with_limit(10).with_offset(20);
        assert_eq!(pagination.to_sql(), "LIMIT 10 OFFSET 20");
        assert_eq!(Pagination::new().to_sql(), "");
    }
}
