//! yamdb-api library - review service HTTP API
//!
//! Users rate and comment on titles grouped by category and genre. All state
//! lives in SQLite; requests are stateless apart from the bearer token.

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use yamdb_common::db::SectionKind;

pub mod api;
pub mod error;
pub mod extract;
pub mod mail;
pub mod pagination;
pub mod permissions;
pub mod token;

use mail::Mailer;
use token::TokenIssuer;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Access token signing and verification
    pub tokens: Arc<TokenIssuer>,
    /// Confirmation code delivery
    pub mailer: Arc<Mailer>,
    /// Rows per page on list endpoints
    pub page_size: i64,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, tokens: TokenIssuer, mailer: Mailer, page_size: i64) -> Self {
        Self {
            db,
            tokens: Arc::new(tokens),
            mailer: Arc::new(mailer),
            page_size,
        }
    }
}

/// Build application router
///
/// Everything except `/health` lives under `/api/v1/` with trailing slashes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::auth_routes())
        .merge(api::user_routes())
        .merge(api::section_routes(SectionKind::Category))
        .merge(api::section_routes(SectionKind::Genre))
        .merge(api::title_routes())
        .merge(api::review_routes())
        .merge(api::comment_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
