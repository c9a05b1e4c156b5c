//! Titles
//!
//! Reads return the nested representation with category, genres and the
//! rating; writes take and return category and genres as slugs.

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode, Uri},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;
use yamdb_common::db::titles::{self, TitleFilter, TitleOrder};
use yamdb_common::db::{sections, NewTitle, SectionKind, Title, TitleChanges};
use yamdb_common::validators::validate_year;

use super::sections::SectionResponse;
use super::{parse_id, query_value, query_values};
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::extract::{
    add_validation_error, nullable, CheckFields, CurrentUser, Validated, WriteMode,
};
use crate::pagination::{calculate_pagination, requested_page, Page};
use crate::permissions;
use crate::AppState;

/// Read representation
#[derive(Debug, Serialize)]
pub struct TitleResponse {
    pub id: i64,
    pub name: String,
    pub year: i64,
    /// Integer part of the average score; `null` without reviews
    pub rating: Option<i64>,
    pub description: Option<String>,
    pub genre: Vec<SectionResponse>,
    pub category: Option<SectionResponse>,
}

impl From<Title> for TitleResponse {
    fn from(title: Title) -> Self {
        Self {
            id: title.id,
            name: title.name,
            year: title.year,
            rating: title.rating.map(|r| r.trunc() as i64),
            description: title.description,
            genre: title.genres.into_iter().map(SectionResponse::from).collect(),
            category: title.category.map(SectionResponse::from),
        }
    }
}

/// Write representation: relations as slugs
#[derive(Debug, Serialize)]
pub struct TitleWriteResponse {
    pub id: i64,
    pub name: String,
    pub year: i64,
    pub description: Option<String>,
    pub genre: Vec<String>,
    pub category: Option<String>,
}

impl From<Title> for TitleWriteResponse {
    fn from(title: Title) -> Self {
        Self {
            id: title.id,
            name: title.name,
            year: title.year,
            description: title.description,
            genre: title.genres.into_iter().map(|g| g.slug).collect(),
            category: title.category.map(|c| c.slug),
        }
    }
}

/// Title body. Every field tells an absent key from an explicit `null`;
/// only `description` may be cleared.
#[derive(Debug, Deserialize, Validate)]
pub struct TitleRequest {
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 256))]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub year: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub genre: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
}

impl CheckFields for TitleRequest {
    fn check_fields(&self, mode: WriteMode, errors: &mut FieldErrors) {
        mode.require_text(errors, "name", &self.name);
        mode.require(errors, "year", &self.year);
        if let Some(Some(year)) = &self.year {
            if let Err(e) = validate_year(year) {
                add_validation_error(errors, "year", &e);
            }
        }
        mode.require(errors, "genre", &self.genre);
        mode.require_text(errors, "category", &self.category);
    }
}

/// Category and genre ids resolved from request slugs; `None` means unchanged
struct Relations {
    category_id: Option<i64>,
    genre_ids: Option<Vec<i64>>,
}

async fn resolve_relations(state: &AppState, body: &TitleRequest) -> ApiResult<Relations> {
    let mut errors = FieldErrors::new();

    let mut category_id = None;
    if let Some(Some(slug)) = &body.category {
        match sections::get_by_slug(&state.db, SectionKind::Category, slug).await? {
            Some(category) => category_id = Some(category.id),
            None => errors.add(
                "category",
                format!("Object with slug={} does not exist.", slug),
            ),
        }
    }

    let mut genre_ids = None;
    if let Some(Some(slugs)) = &body.genre {
        match sections::resolve_slugs(&state.db, SectionKind::Genre, slugs).await {
            Ok(genres) => genre_ids = Some(genres.into_iter().map(|g| g.id).collect()),
            Err(yamdb_common::Error::NotFound(slug)) => errors.add(
                "genre",
                format!("Object with slug={} does not exist.", slug),
            ),
            Err(e) => return Err(e.into()),
        }
    }

    errors.into_result()?;
    Ok(Relations {
        category_id,
        genre_ids,
    })
}

/// Build the list filter from query parameters, rejecting unknown slugs
async fn parse_filter(state: &AppState, params: &[(String, String)]) -> ApiResult<TitleFilter> {
    let mut errors = FieldErrors::new();

    let filter = TitleFilter {
        categories: query_values(params, "category"),
        genres: query_values(params, "genre"),
        name: query_value(params, "name")
            .filter(|n| !n.is_empty())
            .map(String::from),
        year: match query_value(params, "year").filter(|y| !y.is_empty()) {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(year) => Some(year),
                Err(_) => {
                    errors.add("year", "Enter a number.");
                    None
                }
            },
            None => None,
        },
    };

    for (field, kind, slugs) in [
        ("category", SectionKind::Category, &filter.categories),
        ("genre", SectionKind::Genre, &filter.genres),
    ] {
        for slug in slugs {
            if sections::get_by_slug(&state.db, kind, slug).await?.is_none() {
                errors.add(
                    field,
                    format!(
                        "Select a valid choice. {} is not one of the available choices.",
                        slug
                    ),
                );
            }
        }
    }

    errors.into_result()?;
    Ok(filter)
}

/// `?ordering=-year,name`; unknown terms are ignored
fn parse_ordering(params: &[(String, String)]) -> Vec<TitleOrder> {
    query_value(params, "ordering")
        .map(|raw| raw.split(',').filter_map(TitleOrder::parse).collect())
        .unwrap_or_default()
}

async fn find_title(state: &AppState, raw_id: &str) -> ApiResult<Title> {
    let id = parse_id(raw_id)?;
    titles::get(&state.db, id).await?.ok_or(ApiError::NotFound)
}

/// GET /api/v1/titles/
pub async fn list_titles(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<Vec<(String, String)>>,
    uri: Uri,
) -> ApiResult<Json<Page<TitleResponse>>> {
    let filter = parse_filter(&state, &params).await?;
    let ordering = parse_ordering(&params);

    let page = requested_page(&params)?;
    let total = titles::count(&state.db, &filter).await?;
    let pagination =
        calculate_pagination(total, page, state.page_size).ok_or(ApiError::InvalidPage)?;

    let rows = titles::list(
        &state.db,
        &filter,
        &ordering,
        pagination.limit,
        pagination.offset,
    )
    .await?;
    let results = rows.into_iter().map(TitleResponse::from).collect();

    Ok(Json(Page::new(results, total, &pagination, &uri)))
}

/// POST /api/v1/titles/
pub async fn create_title(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Validated<TitleRequest>,
) -> ApiResult<(StatusCode, Json<TitleWriteResponse>)> {
    permissions::admin_or_read_only(&Method::POST, user.as_ref())?;
    let body = body.into_inner()?;
    let relations = resolve_relations(&state, &body).await?;

    let new_title = NewTitle {
        name: body.name.flatten().unwrap_or_default(),
        year: body.year.flatten().unwrap_or_default(),
        description: body.description.flatten(),
        category_id: relations.category_id,
        genre_ids: relations.genre_ids.unwrap_or_default(),
    };
    let title = titles::insert(&state.db, &new_title).await?;

    info!(id = title.id, name = %title.name, "Created title");
    Ok((StatusCode::CREATED, Json(title.into())))
}

/// GET /api/v1/titles/{id}/
pub async fn get_title(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<TitleResponse>> {
    let title = find_title(&state, &id).await?;
    Ok(Json(title.into()))
}

/// PUT/PATCH /api/v1/titles/{id}/
pub async fn update_title(
    State(state): State<AppState>,
    method: Method,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    body: Validated<TitleRequest>,
) -> ApiResult<Json<TitleWriteResponse>> {
    permissions::admin_or_read_only(&method, user.as_ref())?;
    let existing = find_title(&state, &id).await?;
    let body = body.into_inner()?;
    let relations = resolve_relations(&state, &body).await?;

    let changes = TitleChanges {
        name: body.name.flatten(),
        year: body.year.flatten(),
        description: body.description,
        category_id: relations.category_id.map(Some),
        genre_ids: relations.genre_ids,
    };
    let title = titles::update(&state.db, existing.id, &changes).await?;

    Ok(Json(title.into()))
}

/// DELETE /api/v1/titles/{id}/
///
/// Reviews and their comments go with the title.
pub async fn delete_title(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    permissions::admin_or_read_only(&Method::DELETE, user.as_ref())?;
    let id = parse_id(&id)?;

    if !titles::delete(&state.db, id).await? {
        return Err(ApiError::NotFound);
    }

    info!(id, "Deleted title");
    Ok(StatusCode::NO_CONTENT)
}

/// Build title routes
pub fn title_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/titles/", get(list_titles).post(create_title))
        .route(
            "/api/v1/titles/:title_id/",
            get(get_title)
                .put(update_title)
                .patch(update_title)
                .delete(delete_title),
        )
}
