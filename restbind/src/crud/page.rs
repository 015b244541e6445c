//! List request and response descriptors

use serde::{Deserialize, Serialize};

use crate::bind::FieldTags;
use crate::repository::{FilterCondition, OrderDirection, Pagination};

/// Page size used when the request leaves `perPage` unset or zero
pub const DEFAULT_PER_PAGE: u64 = 20;

/// Pagination and ordering for a list call
///
/// Bound from the query string (`?page=2&perPage=10&orderBy=age&orderDir=desc`)
/// or a JSON body with the same camelCase keys. Query keys are also accepted
/// in snake_case.
///
/// `filters` is never bound from the request. A list pre-hook fills it to
/// restrict both the count and the fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: i64,
    pub per_page: u64,
    pub order_by: String,
    pub order_dir: String,
    pub keywords: String,
    #[serde(skip)]
    pub filters: Vec<FilterCondition>,
}

impl FieldTags for PageRequest {
    fn query_field(key: &str) -> Option<&str> {
        match key {
            "page" => Some("page"),
            "perPage" | "per_page" => Some("perPage"),
            "orderBy" | "order_by" => Some("orderBy"),
            "orderDir" | "order_dir" | "orderDirection" | "order_direction" => Some("orderDir"),
            "keywords" => Some("keywords"),
            _ => None,
        }
    }

    fn uri_field(_key: &str) -> Option<&str> {
        None
    }
}

impl PageRequest {
    /// A request for `page` with the given page size
    pub fn new(page: i64, per_page: u64) -> Self {
        Self {
            page,
            per_page,
            ..Self::default()
        }
    }

    /// Add a condition applied to both the count and the fetch
    #[must_use]
    pub fn with_filter(mut self, filter: FilterCondition) -> Self {
        self.filters.push(filter);
        self
    }

    /// Order by `field`; `dir` of `"desc"` sorts descending
    #[must_use]
    pub fn with_order(mut self, field: impl Into<String>, dir: impl Into<String>) -> Self {
        self.order_by = field.into();
        self.order_dir = dir.into();
        self
    }

    /// Effective page size
    pub fn per_page(&self) -> u64 {
        if self.per_page == 0 {
            DEFAULT_PER_PAGE
        } else {
            self.per_page
        }
    }

    /// Offset of the first row, `(page - 1) * per_page`
    ///
    /// Negative when `page < 1`.
    ///
    /// ```rust
    /// use restbind::crud::PageRequest;
    ///
    /// assert_eq!(PageRequest::new(3, 0).start(), 40);
    /// assert_eq!(PageRequest::new(0, 10).start(), -10);
    /// ```
    pub fn start(&self) -> i64 {
        let per_page = i64::try_from(self.per_page()).unwrap_or(i64::MAX);
        self.page.saturating_sub(1).saturating_mul(per_page)
    }

    /// Ordering clause, present only when `order_by` is set
    pub fn order(&self) -> Option<(&str, OrderDirection)> {
        if self.order_by.is_empty() {
            None
        } else {
            Some((
                self.order_by.as_str(),
                OrderDirection::from_param(&self.order_dir),
            ))
        }
    }

    /// Limit and offset for the fetch; negative offsets clamp to zero
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.start().max(0).unsigned_abs(), self.per_page())
    }
}

/// One page of a list call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageData<T> {
    /// Rows matching the filters, ignoring pagination
    pub total: u64,
    /// Rows on this page
    pub items: Vec<T>,
}

impl<T> Default for PageData<T> {
    fn default() -> Self {
        Self {
            total: 0,
            items: Vec::new(),
        }
    }
}
