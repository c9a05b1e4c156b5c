//! Page number pagination for list endpoints
//!
//! `?page=N` (1-indexed). Responses carry `{count, next, previous, results}`
//! with `next`/`previous` as relative URLs.

use axum::http::Uri;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};

/// Page size used when configuration does not override it
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Query parameter holding the page number
pub const PAGE_PARAM: &str = "page";

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
    /// Rows per page
    pub limit: i64,
}

impl Pagination {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Calculate pagination metadata from total results and requested page
///
/// Page 1 always exists, even for an empty result set. Any other page past
/// the end yields `None`.
///
/// # Examples
/// ```
/// use yamdb_api::pagination::calculate_pagination;
///
/// // 25 results at 10 per page = 3 pages (10 + 10 + 5)
/// let p = calculate_pagination(25, 2, 10).unwrap();
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 10);
///
/// assert!(calculate_pagination(25, 4, 10).is_none());
/// ```
pub fn calculate_pagination(
    total_results: i64,
    requested_page: i64,
    page_size: i64,
) -> Option<Pagination> {
    let page_size = page_size.max(1);
    let total_pages = (total_results + page_size - 1) / page_size;

    if requested_page < 1 || (requested_page > total_pages && requested_page != 1) {
        return None;
    }

    Some(Pagination {
        page: requested_page,
        total_pages,
        offset: (requested_page - 1) * page_size,
        limit: page_size,
    })
}

/// Page number from decoded query parameters; absent means page 1
pub fn requested_page(params: &[(String, String)]) -> ApiResult<i64> {
    match params.iter().find(|(key, _)| key == PAGE_PARAM) {
        None => Ok(1),
        Some((_, value)) => match value.trim().parse::<i64>() {
            Ok(page) if page >= 1 => Ok(page),
            _ => Err(ApiError::InvalidPage),
        },
    }
}

/// One page of a list response
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, count: i64, pagination: &Pagination, uri: &Uri) -> Self {
        let next = pagination
            .has_next()
            .then(|| page_url(uri, pagination.page + 1));
        let previous = pagination
            .has_previous()
            .then(|| page_url(uri, pagination.page - 1));

        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

/// Request URL with its page parameter replaced; page 1 drops the parameter
fn page_url(uri: &Uri, page: i64) -> String {
    let mut pairs: Vec<String> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some(PAGE_PARAM))
        .map(String::from)
        .collect();

    if page > 1 {
        pairs.push(format!("{}={}", PAGE_PARAM, page));
    }

    if pairs.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), pairs.join("&"))
    }
}
