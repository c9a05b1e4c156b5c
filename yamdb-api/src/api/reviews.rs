//! Reviews of a title
//!
//! One review per author and title. Reads are public; edits belong to the
//! author or a moderator.

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode, Uri},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;
use yamdb_common::db::{reviews, titles, Review};

use super::parse_id;
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::extract::{nullable, CheckFields, CurrentUser, Validated, WriteMode};
use crate::pagination::{calculate_pagination, requested_page, Page};
use crate::permissions;
use crate::AppState;

const ALREADY_REVIEWED: &str = "You have already reviewed this title.";

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub score: i64,
    pub pub_date: DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            text: review.text,
            author: review.author,
            score: review.score,
            pub_date: review.pub_date,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub text: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(range(min = 1, max = 10, message = "Score must be between 1 and 10."))]
    pub score: Option<Option<i64>>,
}

impl CheckFields for ReviewRequest {
    fn check_fields(&self, mode: WriteMode, errors: &mut FieldErrors) {
        mode.require_text(errors, "text", &self.text);
        mode.require(errors, "score", &self.score);
    }
}

/// Title id from the path, 404 when no such title exists
pub(crate) async fn existing_title(state: &AppState, raw_id: &str) -> ApiResult<i64> {
    let id = parse_id(raw_id)?;
    if titles::exists(&state.db, id).await? {
        Ok(id)
    } else {
        Err(ApiError::NotFound)
    }
}

/// Review under a title, 404 when either is missing or they do not match
pub(crate) async fn find_review(state: &AppState, raw_title_id: &str, raw_id: &str) -> ApiResult<Review> {
    let title_id = existing_title(state, raw_title_id).await?;
    let id = parse_id(raw_id)?;
    reviews::get_review(&state.db, title_id, id)
        .await?
        .ok_or(ApiError::NotFound)
}

/// GET /api/v1/titles/{title_id}/reviews/
pub async fn list_reviews(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(title_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    uri: Uri,
) -> ApiResult<Json<Page<ReviewResponse>>> {
    let title_id = existing_title(&state, &title_id).await?;

    let page = requested_page(&params)?;
    let total = reviews::count_reviews(&state.db, title_id).await?;
    let pagination =
        calculate_pagination(total, page, state.page_size).ok_or(ApiError::InvalidPage)?;

    let rows =
        reviews::list_reviews(&state.db, title_id, pagination.limit, pagination.offset).await?;
    let results = rows.into_iter().map(ReviewResponse::from).collect();

    Ok(Json(Page::new(results, total, &pagination, &uri)))
}

/// POST /api/v1/titles/{title_id}/reviews/
pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(title_id): Path<String>,
    body: Validated<ReviewRequest>,
) -> ApiResult<(StatusCode, Json<ReviewResponse>)> {
    let author = permissions::authenticated(user.as_ref())?;
    let title_id = existing_title(&state, &title_id).await?;
    let body = body.into_inner()?;

    if reviews::has_reviewed(&state.db, title_id, author.id).await? {
        return Err(ApiError::non_field(ALREADY_REVIEWED));
    }

    let review = reviews::insert_review(
        &state.db,
        title_id,
        author.id,
        body.text.flatten().as_deref().unwrap_or_default(),
        body.score.flatten().unwrap_or_default(),
    )
    .await
    .map_err(|e| match e {
        yamdb_common::Error::Conflict(_) => ApiError::non_field(ALREADY_REVIEWED),
        other => other.into(),
    })?;

    info!(title_id, review_id = review.id, author = %author.username, "Created review");
    Ok((StatusCode::CREATED, Json(review.into())))
}

/// GET /api/v1/titles/{title_id}/reviews/{review_id}/
pub async fn get_review(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path((title_id, review_id)): Path<(String, String)>,
) -> ApiResult<Json<ReviewResponse>> {
    let review = find_review(&state, &title_id, &review_id).await?;
    Ok(Json(review.into()))
}

/// PUT/PATCH /api/v1/titles/{title_id}/reviews/{review_id}/
pub async fn update_review(
    State(state): State<AppState>,
    method: Method,
    CurrentUser(user): CurrentUser,
    Path((title_id, review_id)): Path<(String, String)>,
    body: Validated<ReviewRequest>,
) -> ApiResult<Json<ReviewResponse>> {
    permissions::authenticated_or_read_only(&method, user.as_ref())?;
    let review = find_review(&state, &title_id, &review_id).await?;
    permissions::author_or_moderator_or_read_only(&method, user.as_ref(), review.author_id)?;
    let body = body.into_inner()?;

    let updated = reviews::update_review(
        &state.db,
        review.title_id,
        review.id,
        body.text.flatten().as_deref(),
        body.score.flatten(),
    )
    .await?;

    Ok(Json(updated.into()))
}

/// DELETE /api/v1/titles/{title_id}/reviews/{review_id}/
pub async fn delete_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((title_id, review_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    permissions::authenticated_or_read_only(&Method::DELETE, user.as_ref())?;
    let review = find_review(&state, &title_id, &review_id).await?;
    permissions::author_or_moderator_or_read_only(&Method::DELETE, user.as_ref(), review.author_id)?;

    reviews::delete_review(&state.db, review.title_id, review.id).await?;

    info!(title_id = review.title_id, review_id = review.id, "Deleted review");
    Ok(StatusCode::NO_CONTENT)
}

/// Build review routes
pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/titles/:title_id/reviews/",
            get(list_reviews).post(create_review),
        )
        .route(
            "/api/v1/titles/:title_id/reviews/:review_id/",
            get(get_review)
                .put(update_review)
                .patch(update_review)
                .delete(delete_review),
        )
}
