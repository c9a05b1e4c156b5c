//! Comments on a review
//!
//! A comment is only reachable through the title and review it belongs to.

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
use yamdb_common::db::{reviews, Comment};

use super::parse_id;
use super::reviews::find_review;
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::extract::{nullable, CheckFields, CurrentUser, Validated, WriteMode};
use crate::pagination::{calculate_pagination, requested_page, Page};
use crate::permissions;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub pub_date: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            text: comment.text,
            author: comment.author,
            pub_date: comment.pub_date,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub text: Option<Option<String>>,
}

impl CheckFields for CommentRequest {
    fn check_fields(&self, mode: WriteMode, errors: &mut FieldErrors) {
        mode.require_text(errors, "text", &self.text);
    }
}

async fn find_comment(
    state: &AppState,
    title_id: &str,
    review_id: &str,
    comment_id: &str,
) -> ApiResult<Comment> {
    let review = find_review(state, title_id, review_id).await?;
    let id = parse_id(comment_id)?;
    reviews::get_comment(&state.db, review.id, id)
        .await?
        .ok_or(ApiError::NotFound)
}

/// GET /api/v1/titles/{title_id}/reviews/{review_id}/comments/
pub async fn list_comments(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path((title_id, review_id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
    uri: Uri,
) -> ApiResult<Json<Page<CommentResponse>>> {
    let review = find_review(&state, &title_id, &review_id).await?;

    let page = requested_page(&params)?;
    let total = reviews::count_comments(&state.db, review.id).await?;
    let pagination =
        calculate_pagination(total, page, state.page_size).ok_or(ApiError::InvalidPage)?;

    let rows =
        reviews::list_comments(&state.db, review.id, pagination.limit, pagination.offset).await?;
    let results = rows.into_iter().map(CommentResponse::from).collect();

    Ok(Json(Page::new(results, total, &pagination, &uri)))
}

/// POST /api/v1/titles/{title_id}/reviews/{review_id}/comments/
pub async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((title_id, review_id)): Path<(String, String)>,
    body: Validated<CommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    let author = permissions::authenticated(user.as_ref())?;
    let review = find_review(&state, &title_id, &review_id).await?;
    let body = body.into_inner()?;

    let comment = reviews::insert_comment(
        &state.db,
        review.id,
        author.id,
        body.text.flatten().as_deref().unwrap_or_default(),
    )
    .await?;

    info!(review_id = review.id, comment_id = comment.id, author = %author.username, "Created comment");
    Ok((StatusCode::CREATED, Json(comment.into())))
}

/// GET /api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/
pub async fn get_comment(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path((title_id, review_id, comment_id)): Path<(String, String, String)>,
) -> ApiResult<Json<CommentResponse>> {
    let comment = find_comment(&state, &title_id, &review_id, &comment_id).await?;
    Ok(Json(comment.into()))
}

/// PUT/PATCH /api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/
pub async fn update_comment(
    State(state): State<AppState>,
    method: Method,
    CurrentUser(user): CurrentUser,
    Path((title_id, review_id, comment_id)): Path<(String, String, String)>,
    body: Validated<CommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    permissions::authenticated_or_read_only(&method, user.as_ref())?;
    let comment = find_comment(&state, &title_id, &review_id, &comment_id).await?;
    permissions::author_or_moderator_or_read_only(&method, user.as_ref(), comment.author_id)?;
    let body = body.into_inner()?;

    let updated = reviews::update_comment(
        &state.db,
        comment.review_id,
        comment.id,
        body.text.flatten().as_deref(),
    )
    .await?;

    Ok(Json(updated.into()))
}

/// DELETE /api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/
pub async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((title_id, review_id, comment_id)): Path<(String, String, String)>,
) -> ApiResult<StatusCode> {
    permissions::authenticated_or_read_only(&Method::DELETE, user.as_ref())?;
    let comment = find_comment(&state, &title_id, &review_id, &comment_id).await?;
    permissions::author_or_moderator_or_read_only(
        &Method::DELETE,
        user.as_ref(),
        comment.author_id,
    )?;

    reviews::delete_comment(&state.db, comment.review_id, comment.id).await?;

    info!(review_id = comment.review_id, comment_id = comment.id, "Deleted comment");
    Ok(StatusCode::NO_CONTENT)
}

/// Build comment routes
pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/titles/:title_id/reviews/:review_id/comments/",
            get(list_comments).post(create_comment),
        )
        .route(
            "/api/v1/titles/:title_id/reviews/:review_id/comments/:comment_id/",
            get(get_comment)
                .put(update_comment)
                .patch(update_comment)
                .delete(delete_comment),
        )
}
