//! User management
//!
//! Admins manage every account under `/api/v1/users/`; any authenticated user
//! reads and edits their own profile under `/api/v1/users/me/`.

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;
use yamdb_common::db::{users, NewUser, Role, User, UserChanges};
use yamdb_common::validators::validate_username;

use super::query_value;
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::extract::{nullable, CheckFields, CurrentUser, Validated, WriteMode};
use crate::pagination::{calculate_pagination, requested_page, Page};
use crate::permissions;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            role: user.role,
        }
    }
}

/// Admin body for `/users/` and `/users/{username}/`. Name fields and `bio`
/// may be cleared with `null`.
#[derive(Debug, Deserialize, Validate)]
pub struct UserRequest {
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 150), custom(function = "validate_username"))]
    pub username: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(email, length(max = 254))]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 150))]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 150))]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub role: Option<Option<String>>,
}

impl CheckFields for UserRequest {
    fn check_fields(&self, mode: WriteMode, errors: &mut FieldErrors) {
        mode.require_text(errors, "username", &self.username);
        mode.require_text(errors, "email", &self.email);
        match &self.role {
            Some(Some(role)) => {
                if let Err(msg) = role.parse::<Role>() {
                    errors.add("role", msg);
                }
            }
            Some(None) => errors.add("role", "This field may not be null."),
            None => {}
        }
    }
}

impl UserRequest {
    fn parsed_role(&self) -> Option<Role> {
        self.role
            .as_ref()
            .and_then(|r| r.as_deref())
            .and_then(|r| r.parse().ok())
    }

    fn into_new_user(self) -> NewUser {
        let role = self.parsed_role().unwrap_or_default();
        NewUser {
            username: self.username.flatten().unwrap_or_default(),
            email: self.email.flatten().unwrap_or_default(),
            role,
            first_name: self.first_name.flatten(),
            last_name: self.last_name.flatten(),
            bio: self.bio.flatten(),
        }
    }

    fn into_changes(self) -> UserChanges {
        let role = self.parsed_role();
        UserChanges {
            username: self.username.flatten(),
            email: self.email.flatten(),
            role,
            first_name: self.first_name,
            last_name: self.last_name,
            bio: self.bio,
        }
    }
}

/// Profile edit body for `/users/me/`. `role` is accepted and discarded.
#[derive(Debug, Deserialize, Validate)]
pub struct ProfileRequest {
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 150), custom(function = "validate_username"))]
    pub username: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(email, length(max = 254))]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 150))]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 150))]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub bio: Option<Option<String>>,
    pub role: Option<serde_json::Value>,
}

impl CheckFields for ProfileRequest {
    fn check_fields(&self, mode: WriteMode, errors: &mut FieldErrors) {
        mode.require_text(errors, "username", &self.username);
        mode.require_text(errors, "email", &self.email);
    }
}

impl ProfileRequest {
    fn into_changes(self) -> UserChanges {
        UserChanges {
            username: self.username.flatten(),
            email: self.email.flatten(),
            role: None,
            first_name: self.first_name,
            last_name: self.last_name,
            bio: self.bio,
        }
    }
}

/// Turn a store uniqueness conflict into an error on the offending field
fn user_conflict(err: yamdb_common::Error) -> ApiError {
    match err {
        yamdb_common::Error::Conflict(msg) if msg.contains("users.username") => {
            ApiError::field("username", "A user with that username already exists.")
        }
        yamdb_common::Error::Conflict(msg) if msg.contains("users.email") => {
            ApiError::field("email", "A user with that email already exists.")
        }
        other => other.into(),
    }
}

async fn find_user(state: &AppState, username: &str) -> ApiResult<User> {
    users::get_by_username(&state.db, username)
        .await?
        .ok_or(ApiError::NotFound)
}

/// GET /api/v1/users/?search=
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<Vec<(String, String)>>,
    uri: Uri,
) -> ApiResult<Json<Page<UserResponse>>> {
    permissions::admin(user.as_ref())?;

    let search = query_value(&params, "search");
    let page = requested_page(&params)?;
    let total = users::count(&state.db, search).await?;
    let pagination =
        calculate_pagination(total, page, state.page_size).ok_or(ApiError::InvalidPage)?;

    let rows = users::list(&state.db, search, pagination.limit, pagination.offset).await?;
    let results = rows.into_iter().map(UserResponse::from).collect();

    Ok(Json(Page::new(results, total, &pagination, &uri)))
}

/// POST /api/v1/users/
pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Validated<UserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let admin = permissions::admin(user.as_ref())?;
    let body = body.into_inner()?;

    let created = users::insert(&state.db, &body.into_new_user())
        .await
        .map_err(user_conflict)?;

    info!(admin = %admin.username, username = %created.username, role = %created.role, "Created user");
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /api/v1/users/{username}/
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    permissions::admin(user.as_ref())?;
    let found = find_user(&state, &username).await?;
    Ok(Json(found.into()))
}

/// PUT/PATCH /api/v1/users/{username}/
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
    body: Validated<UserRequest>,
) -> ApiResult<Json<UserResponse>> {
    permissions::admin(user.as_ref())?;
    let target = find_user(&state, &username).await?;
    let body = body.into_inner()?;

    let updated = users::update(&state.db, target.id, &body.into_changes())
        .await
        .map_err(user_conflict)?;

    Ok(Json(updated.into()))
}

/// DELETE /api/v1/users/{username}/
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> ApiResult<StatusCode> {
    let admin = permissions::admin(user.as_ref())?;

    if !users::delete_by_username(&state.db, &username).await? {
        return Err(ApiError::NotFound);
    }

    info!(admin = %admin.username, username = %username, "Deleted user");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/users/me/
pub async fn get_me(CurrentUser(user): CurrentUser) -> ApiResult<Json<UserResponse>> {
    let me = permissions::authenticated(user.as_ref())?;
    Ok(Json(me.clone().into()))
}

/// PATCH /api/v1/users/me/
///
/// `role` in the body is discarded for every caller. Roles only change
/// through `/api/v1/users/{username}/`.
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Validated<ProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    let me = permissions::authenticated(user.as_ref())?;
    let body = body.into_inner()?;

    if body.role.is_some() {
        warn!(username = %me.username, "Ignoring role in profile update");
    }

    let updated = users::update(&state.db, me.id, &body.into_changes())
        .await
        .map_err(user_conflict)?;

    Ok(Json(updated.into()))
}

/// Build user routes
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/users/", get(list_users).post(create_user))
        .route("/api/v1/users/me/", get(get_me).patch(update_me))
        .route(
            "/api/v1/users/:username/",
            get(get_user)
                .put(update_user)
                .patch(update_user)
                .delete(delete_user),
        )
}
