//! List, filter, sort and paginate
//!
//! Every list endpoint goes through [`ListRequest::from_params`] and
//! [`list`]: query-string parameters are validated against the collection's
//! [`CollectionSchema`], turned into a [`Filter`], a [`Sort`] and a [`Page`],
//! and the page of items is fetched alongside the total count.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::QueryConfig;
use crate::document::{CollectionSchema, Document};
use crate::store::{Collection, StoredDocument};

/// Reserved query parameters; everything else is looked up as a filter field
pub const PARAM_PAGE: &str = "page";
pub const PARAM_LIMIT: &str = "limit";
pub const PARAM_SORT_BY: &str = "sortBy";
pub const PARAM_ORDER: &str = "order";
pub const PARAM_SEARCH: &str = "search";

/// Field every document carries and every collection sorts on by default
pub const CREATED_AT: &str = "createdAt";

/// List parameter validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("page must be a positive integer, got '{0}'")]
    InvalidPage(String),

    #[error("limit must be a positive integer, got '{0}'")]
    InvalidLimit(String),

    #[error("cannot sort by '{0}'")]
    UnknownSortField(String),

    #[error("order must be 'asc' or 'desc', got '{0}'")]
    InvalidSortOrder(String),

    #[error("invalid value '{value}' for filter '{field}'")]
    InvalidFilterValue { field: String, value: String },
}

impl QueryError {
    /// The request parameter the error refers to
    pub fn param(&self) -> &str {
        match self {
            QueryError::InvalidPage(_) => PARAM_PAGE,
            QueryError::InvalidLimit(_) => PARAM_LIMIT,
            QueryError::UnknownSortField(_) => PARAM_SORT_BY,
            QueryError::InvalidSortOrder(_) => PARAM_ORDER,
            QueryError::InvalidFilterValue { field, .. } => field,
        }
    }
}

// ============================================================================
// Filter
// ============================================================================

/// A single predicate; a [`Filter`] is the conjunction of its conditions
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value exactly
    Equals { field: String, value: Value },
    /// Case-insensitive substring match on any of the fields
    Search { fields: Vec<String>, needle: String },
    /// `from <= createdAt < to`
    CreatedBetween {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Equals {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn search(mut self, fields: &[&str], needle: impl Into<String>) -> Self {
        self.conditions.push(Condition::Search {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            needle: needle.into(),
        });
        self
    }

    pub fn created_between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.conditions.push(Condition::CreatedBetween { from, to });
        self
    }

    /// Replace any existing condition on `field` with an exact match
    pub fn force_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .retain(|c| !matches!(c, Condition::Equals { field: f, .. } if f == field));
        self.eq(field, value)
    }

    /// Evaluate against a stored document
    pub fn matches(&self, doc: &StoredDocument) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::Equals { field, value } => doc.body.get(field) == Some(value),
            Condition::Search { fields, needle } => {
                let needle = needle.to_lowercase();
                fields.iter().any(|field| {
                    doc.body
                        .get(field)
                        .is_some_and(|v| {
                            search_candidates(v)
                                .iter()
                                .any(|candidate| candidate.to_lowercase().contains(&needle))
                        })
                })
            }
            Condition::CreatedBetween { from, to } => {
                from.map_or(true, |from| doc.created_at >= from)
                    && to.map_or(true, |to| doc.created_at < to)
            }
        })
    }
}

/// Values a search condition looks at: a string, or each array element
fn search_candidates(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().flat_map(search_candidates).collect(),
        Value::String(s) => vec![s.clone()],
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

// ============================================================================
// Sort
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl std::str::FromStr for SortDirection {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" | "1" => Ok(SortDirection::Asc),
            "desc" | "descending" | "-1" => Ok(SortDirection::Desc),
            _ => Err(QueryError::InvalidSortOrder(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

impl Default for Sort {
    fn default() -> Self {
        Self::new(CREATED_AT, SortDirection::Desc)
    }
}

// ============================================================================
// Pagination
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-indexed
    pub page: u32,
    /// Never above the configured maximum
    pub limit: u32,
}

impl Page {
    /// Build a page, capping `limit` at `max_limit`
    pub fn new(page: u32, limit: u32, max_limit: u32) -> Result<Self, QueryError> {
        if page == 0 {
            return Err(QueryError::InvalidPage(page.to_string()));
        }
        if limit == 0 {
            return Err(QueryError::InvalidLimit(limit.to_string()));
        }
        Ok(Self {
            page,
            limit: limit.min(max_limit.max(1)),
        })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// One page of results plus the metadata to fetch the rest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub current_page: u32,
    pub total_pages: u64,
    pub limit: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total_count: u64, page: Page) -> Self {
        Self {
            items,
            total_count,
            current_page: page.page,
            total_pages: total_pages(total_count, page.limit),
            limit: page.limit,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            current_page: self.current_page,
            total_pages: self.total_pages,
            limit: self.limit,
        }
    }
}

/// `ceil(total / limit)`
pub fn total_pages(total_count: u64, limit: u32) -> u64 {
    total_count.div_ceil(u64::from(limit.max(1)))
}

// ============================================================================
// Request parsing
// ============================================================================

/// A validated list request
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub filter: Filter,
    pub sort: Sort,
    pub page: Page,
}

impl ListRequest {
    /// Validate raw query parameters against a collection schema
    ///
    /// Unknown parameters are ignored; unknown sort fields, bad sort orders,
    /// malformed page numbers and out-of-set filter values are rejected.
    pub fn from_params(
        schema: &CollectionSchema,
        params: &HashMap<String, String>,
        limits: &QueryConfig,
    ) -> Result<Self, QueryError> {
        let page = match params.get(PARAM_PAGE) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| QueryError::InvalidPage(raw.clone()))?,
            None => 1,
        };
        let limit = match params.get(PARAM_LIMIT) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| QueryError::InvalidLimit(raw.clone()))?,
            None => limits.default_limit,
        };
        let page = Page::new(page, limit, limits.max_limit)?;

        let mut sort = Sort::default();
        if let Some(field) = params.get(PARAM_SORT_BY).filter(|f| !f.trim().is_empty()) {
            let field = field.trim();
            if !schema.is_sortable(field) {
                return Err(QueryError::UnknownSortField(field.to_string()));
            }
            sort.field = field.to_string();
        }
        if let Some(order) = params.get(PARAM_ORDER) {
            sort.direction = order.parse()?;
        }

        let mut filter = Filter::new();
        for field in schema.filterable {
            if let Some(raw) = params.get(field.name).filter(|v| !v.trim().is_empty()) {
                filter = filter.eq(field.name, field.parse_value(raw)?);
            }
        }
        if let Some(needle) = params.get(PARAM_SEARCH).map(|s| s.trim()) {
            if !needle.is_empty() && !schema.search_fields.is_empty() {
                filter = filter.search(schema.search_fields, needle);
            }
        }

        Ok(Self { filter, sort, page })
    }
}

/// Fetch one page and the total count concurrently
///
/// The two reads are independent; a document written between them can make
/// the count disagree with the page by one.
pub async fn list<T: Document>(
    collection: &Collection<T>,
    request: &ListRequest,
) -> crate::Result<Paginated<T>> {
    let (items, total) = tokio::try_join!(
        collection.find(
            &request.filter,
            &request.sort,
            request.page.offset(),
            u64::from(request.page.limit),
        ),
        collection.count(&request.filter),
    )?;

    Ok(Paginated::new(items, total, request.page))
}
