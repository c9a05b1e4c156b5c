//! Categories and genres
//!
//! Both resources share one shape and one set of handlers. Only list, create
//! and delete exist; anything else on an item path is 405.

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode, Uri},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;
use yamdb_common::db::{sections, Section, SectionKind};
use yamdb_common::validators::validate_slug;

use super::query_value;
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::extract::{nullable, CheckFields, CurrentUser, Validated, WriteMode};
use crate::pagination::{calculate_pagination, requested_page, Page};
use crate::permissions;
use crate::AppState;

/// `{name, slug}`: the public shape of a category or genre
#[derive(Debug, Clone, Serialize)]
pub struct SectionResponse {
    pub name: String,
    pub slug: String,
}

impl From<Section> for SectionResponse {
    fn from(section: Section) -> Self {
        Self {
            name: section.name,
            slug: section.slug,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SectionRequest {
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 256))]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 50), custom(function = "validate_slug"))]
    pub slug: Option<Option<String>>,
}

impl CheckFields for SectionRequest {
    fn check_fields(&self, mode: WriteMode, errors: &mut FieldErrors) {
        mode.require_text(errors, "name", &self.name);
        mode.require_text(errors, "slug", &self.slug);
    }
}

/// GET /api/v1/{categories,genres}/?search=
pub async fn list_sections(
    kind: SectionKind,
    state: AppState,
    params: Vec<(String, String)>,
    uri: Uri,
) -> ApiResult<Json<Page<SectionResponse>>> {
    let search = query_value(&params, "search");
    let page = requested_page(&params)?;
    let total = sections::count(&state.db, kind, search).await?;
    let pagination =
        calculate_pagination(total, page, state.page_size).ok_or(ApiError::InvalidPage)?;

    let rows = sections::list(&state.db, kind, search, pagination.limit, pagination.offset).await?;
    let results = rows.into_iter().map(SectionResponse::from).collect();

    Ok(Json(Page::new(results, total, &pagination, &uri)))
}

/// POST /api/v1/{categories,genres}/
pub async fn create_section(
    kind: SectionKind,
    state: AppState,
    user: CurrentUser,
    body: Validated<SectionRequest>,
) -> ApiResult<(StatusCode, Json<SectionResponse>)> {
    permissions::admin_or_read_only(&Method::POST, user.0.as_ref())?;
    let body = body.into_inner()?;
    let name = body.name.flatten().unwrap_or_default();
    let slug = body.slug.flatten().unwrap_or_default();

    let section = sections::insert(&state.db, kind, &name, &slug)
        .await
        .map_err(|e| match e {
            yamdb_common::Error::Conflict(msg) => ApiError::field("slug", msg),
            other => other.into(),
        })?;

    info!(kind = kind.label(), slug = %section.slug, "Created section");
    Ok((StatusCode::CREATED, Json(section.into())))
}

/// DELETE /api/v1/{categories,genres}/{slug}/
pub async fn delete_section(
    kind: SectionKind,
    state: AppState,
    user: CurrentUser,
    slug: String,
) -> ApiResult<StatusCode> {
    permissions::admin_or_read_only(&Method::DELETE, user.0.as_ref())?;

    if !sections::delete_by_slug(&state.db, kind, &slug).await? {
        return Err(ApiError::NotFound);
    }

    info!(kind = kind.label(), slug = %slug, "Deleted section");
    Ok(StatusCode::NO_CONTENT)
}

/// Build list/create/delete routes for one kind of section
pub fn section_routes(kind: SectionKind) -> Router<AppState> {
    let collection = format!("/api/v1/{}/", kind.table());
    let item = format!("/api/v1/{}/:slug/", kind.table());

    Router::new()
        .route(
            &collection,
            get(
                move |State(state): State<AppState>,
                      _user: CurrentUser,
                      Query(params): Query<Vec<(String, String)>>,
                      uri: Uri| list_sections(kind, state, params, uri),
            )
            .post(
                move |State(state): State<AppState>,
                      user: CurrentUser,
                      body: Validated<SectionRequest>| {
                    create_section(kind, state, user, body)
                },
            ),
        )
        .route(
            &item,
            delete(
                move |State(state): State<AppState>, user: CurrentUser, Path(slug): Path<String>| {
                    delete_section(kind, state, user, slug)
                },
            ),
        )
}
