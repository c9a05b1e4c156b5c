//! Per-request permission predicates
//!
//! Denials depend on who is asking: anonymous callers get 401, authenticated
//! ones 403.

use axum::http::Method;
use yamdb_common::db::User;

use crate::error::{ApiError, ApiResult};

/// GET, HEAD and OPTIONS never modify anything
pub fn is_read_only(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn deny(user: Option<&User>) -> ApiError {
    match user {
        Some(_) => ApiError::PermissionDenied,
        None => ApiError::NotAuthenticated,
    }
}

/// Any authenticated user
pub fn authenticated(user: Option<&User>) -> ApiResult<&User> {
    user.ok_or(ApiError::NotAuthenticated)
}

/// Admin role or superuser
pub fn admin(user: Option<&User>) -> ApiResult<&User> {
    match user {
        Some(u) if u.is_admin() => Ok(u),
        other => Err(deny(other)),
    }
}

/// Reads for everyone, writes for admins
pub fn admin_or_read_only(method: &Method, user: Option<&User>) -> ApiResult<()> {
    if is_read_only(method) {
        return Ok(());
    }
    admin(user).map(|_| ())
}

/// Reads for everyone, writes for authenticated users
pub fn authenticated_or_read_only(method: &Method, user: Option<&User>) -> ApiResult<()> {
    if is_read_only(method) {
        return Ok(());
    }
    authenticated(user).map(|_| ())
}

/// Object level: reads for everyone, writes for the author or a moderator
pub fn author_or_moderator_or_read_only(
    method: &Method,
    user: Option<&User>,
    author_id: i64,
) -> ApiResult<()> {
    if is_read_only(method) {
        return Ok(());
    }
    match user {
        Some(u) if u.id == author_id || u.is_moderator() => Ok(()),
        other => Err(deny(other)),
    }
}
