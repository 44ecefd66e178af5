//! Row Page Cache: the windowed page currently displayed and the
//! offset/limit/filter parameters that produced (or will produce) it.

use crate::error::AppResult;
use crate::model::{Filter, RowPage};

/// Page sizes offered to the user.
pub const PAGE_SIZES: [u64; 4] = [5, 10, 20, 50];
pub const DEFAULT_PAGE_SIZE: u64 = 10;

pub fn is_supported_page_size(limit: u64) -> bool {
    PAGE_SIZES.contains(&limit)
}

/// Serialize a filter set for the `filters` query parameter. An empty set is
/// not transmitted at all.
pub fn encode_filters(filters: &[Filter]) -> AppResult<Option<String>> {
    if filters.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(filters)?))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
    pub offset: u64,
    pub limit: u64,
    pub filters: Vec<Filter>,
}

#[derive(Debug)]
pub struct RowPageCache {
    query: RowQuery,
    page: Option<RowPage>,
    default_limit: u64,
}

impl RowPageCache {
    pub fn new(default_limit: u64) -> Self {
        Self {
            query: RowQuery { offset: 0, limit: default_limit, filters: Vec::new() },
            page: None,
            default_limit,
        }
    }

    pub fn query(&self) -> &RowQuery {
        &self.query
    }

    pub fn page(&self) -> Option<&RowPage> {
        self.page.as_ref()
    }

    pub fn filters_active(&self) -> bool {
        !self.query.filters.is_empty()
    }

    /// Row count pagination is measured against.
    pub fn total(&self) -> u64 {
        let Some(page) = self.page.as_ref() else { return 0 };
        if self.filters_active() {
            page.total_filtered.unwrap_or(page.total_rows)
        } else {
            page.total_rows
        }
    }

    pub fn can_advance(&self) -> bool {
        self.query.offset + self.query.limit < self.total()
    }

    pub fn can_retreat(&self) -> bool {
        self.query.offset > 0
    }

    /// Each of the mutators below returns true when the parameters changed and
    /// the page must be refetched.
    pub fn advance(&mut self) -> bool {
        if !self.can_advance() {
            return false;
        }
        self.query.offset += self.query.limit;
        true
    }

    pub fn retreat(&mut self) -> bool {
        if !self.can_retreat() {
            return false;
        }
        self.query.offset = self.query.offset.saturating_sub(self.query.limit);
        true
    }

    /// Caller validates the size against `PAGE_SIZES`.
    pub fn set_limit(&mut self, limit: u64) -> bool {
        if limit == self.query.limit {
            return false;
        }
        self.query.limit = limit;
        self.query.offset = 0;
        true
    }

    pub fn set_filters(&mut self, filters: Vec<Filter>) -> bool {
        let changed = filters != self.query.filters || self.query.offset != 0;
        self.query.filters = filters;
        self.query.offset = 0;
        changed
    }

    pub fn add_filter(&mut self, filter: Filter) -> bool {
        let mut next = self.query.filters.clone();
        next.push(filter);
        self.set_filters(next)
    }

    pub fn install(&mut self, page: RowPage) {
        self.page = Some(page);
    }

    /// Drop the page and return parameters to their initial values.
    pub fn invalidate(&mut self) {
        self.page = None;
        self.query = RowQuery { offset: 0, limit: self.default_limit, filters: Vec::new() };
    }
}
