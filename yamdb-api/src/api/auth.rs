//! Registration and token issuance
//!
//! `POST /api/v1/auth/signup/` mails a confirmation code;
//! `POST /api/v1/auth/token/` trades username + code for a bearer token.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;
use yamdb_common::auth::{
    confirmation_code_matches, generate_confirmation_code, CONFIRMATION_CODE_LENGTH,
};
use yamdb_common::db::{users, NewUser, User};
use yamdb_common::validators::validate_username;

use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::extract::{nullable, CheckFields, Validated, WriteMode};
use crate::AppState;

/// Subject line of the confirmation email
pub const CONFIRMATION_SUBJECT: &str = "Confirmation code";

const CODE_MAX_LENGTH: u64 = CONFIRMATION_CODE_LENGTH as u64;

const IDENTITY_TAKEN: &str = "A user with this username or email already exists.";

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 150), custom(function = "validate_username"))]
    pub username: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(email, length(max = 254))]
    pub email: Option<Option<String>>,
}

impl CheckFields for SignupRequest {
    fn check_fields(&self, mode: WriteMode, errors: &mut FieldErrors) {
        mode.require_text(errors, "username", &self.username);
        mode.require_text(errors, "email", &self.email);
    }
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 150), custom(function = "validate_username"))]
    pub username: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = CODE_MAX_LENGTH))]
    pub confirmation_code: Option<Option<String>>,
}

impl CheckFields for TokenRequest {
    fn check_fields(&self, mode: WriteMode, errors: &mut FieldErrors) {
        mode.require_text(errors, "username", &self.username);
        mode.require_text(errors, "confirmation_code", &self.confirmation_code);
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Existing account with exactly this identity, or a new one.
///
/// A concurrent signup for the same identity can win the insert; the
/// identity is looked up once more before reporting a conflict.
async fn signup_account(state: &AppState, username: String, email: String) -> ApiResult<User> {
    if let Some(user) = users::get_by_identity(&state.db, &username, &email).await? {
        return Ok(user);
    }

    let new_user = NewUser {
        username,
        email,
        ..Default::default()
    };
    match users::insert(&state.db, &new_user).await {
        Ok(user) => Ok(user),
        Err(yamdb_common::Error::Conflict(_)) => {
            users::get_by_identity(&state.db, &new_user.username, &new_user.email)
                .await?
                .ok_or_else(|| ApiError::BadRequest(IDENTITY_TAKEN.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /api/v1/auth/signup/
///
/// Repeating a signup with the same username and email reuses the account
/// and mails a fresh code.
pub async fn signup(
    State(state): State<AppState>,
    body: Validated<SignupRequest>,
) -> ApiResult<Json<SignupResponse>> {
    let body = body.into_inner()?;
    let username = body.username.flatten().unwrap_or_default();
    let email = body.email.flatten().unwrap_or_default();

    let user = signup_account(&state, username, email).await?;

    let code = generate_confirmation_code();
    users::set_confirmation_code(&state.db, user.id, &code).await?;
    state
        .mailer
        .send(&user.email, CONFIRMATION_SUBJECT, &code)
        .await?;

    info!(username = %user.username, "Confirmation code sent");

    Ok(Json(SignupResponse {
        username: user.username,
        email: user.email,
    }))
}

/// POST /api/v1/auth/token/
pub async fn obtain_token(
    State(state): State<AppState>,
    body: Validated<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let body = body.into_inner()?;
    let username = body.username.flatten().unwrap_or_default();
    let code = body.confirmation_code.flatten().unwrap_or_default();

    let user = users::get_by_username(&state.db, &username)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !confirmation_code_matches(user.confirmation_code.as_deref(), &code) {
        return Err(ApiError::BadRequest("Invalid confirmation code.".to_string()));
    }

    let token = state.tokens.issue(user.id)?;
    info!(username = %user.username, "Issued access token");

    Ok(Json(TokenResponse { token }))
}

/// Build auth routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/signup/", post(signup))
        .route("/api/v1/auth/token/", post(obtain_token))
}
