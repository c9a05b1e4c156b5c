//! HTTP API handlers for yamdb-api

pub mod auth;
pub mod comments;
pub mod health;
pub mod reviews;
pub mod sections;
pub mod titles;
pub mod users;

pub use auth::auth_routes;
pub use comments::comment_routes;
pub use health::health_routes;
pub use reviews::review_routes;
pub use sections::section_routes;
pub use titles::title_routes;
pub use users::user_routes;

use crate::error::{ApiError, ApiResult};

/// First value of a decoded query parameter
pub(crate) fn query_value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Every non-empty value of a repeatable query parameter
pub(crate) fn query_values(params: &[(String, String)], key: &str) -> Vec<String> {
    params
        .iter()
        .filter(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.clone())
        .collect()
}

/// Numeric path id; anything else is an unknown resource
pub(crate) fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.parse::<i64>().map_err(|_| ApiError::NotFound)
}
