//! Request extractors
//!
//! - [`CurrentUser`]: bearer token authentication, anonymous when no header
//! - [`Validated`]: JSON body with declarative and per-mode field checks

use std::borrow::Cow;
use std::convert::Infallible;

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderValue, Method},
    Json,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use validator::{Validate, ValidationError, ValidationErrors};
use yamdb_common::db::{users, User};

use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::AppState;

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// The authenticated user, or `None` for anonymous requests.
///
/// A present but unusable `Authorization` header rejects the request with
/// 401 even where anonymous access would be allowed.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<User>);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(AUTHORIZATION) else {
            return Ok(CurrentUser(None));
        };

        let token = extract_bearer_token(value)?;
        let claims = state.tokens.verify(token)?;

        match users::get_by_id(&state.db, claims.user_id).await? {
            Some(user) => Ok(CurrentUser(Some(user))),
            None => Err(ApiError::InvalidToken(format!(
                "user {} no longer exists",
                claims.user_id
            ))),
        }
    }
}

/// Pull the token out of `Authorization: Bearer <token>`
fn extract_bearer_token(value: &HeaderValue) -> ApiResult<&str> {
    let value = value
        .to_str()
        .map_err(|_| ApiError::InvalidToken("authorization header is not ASCII".to_string()))?;

    let mut parts = value.splitn(2, ' ');
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => {
            let token = token.trim();
            if token.is_empty() || token.contains(' ') {
                Err(ApiError::InvalidToken("malformed bearer token".to_string()))
            } else {
                Ok(token)
            }
        }
        _ => Err(ApiError::InvalidToken(
            "authorization header must be 'Bearer <token>'".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// How a body is applied, derived from the request method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// POST: required fields must be present
    Create,
    /// PUT: required fields must be present
    Replace,
    /// PATCH: any subset of fields
    Partial,
}

impl WriteMode {
    pub fn from_method(method: &Method) -> Self {
        match *method {
            Method::PUT => WriteMode::Replace,
            Method::PATCH => WriteMode::Partial,
            _ => WriteMode::Create,
        }
    }

    pub fn is_partial(&self) -> bool {
        *self == WriteMode::Partial
    }

    /// Record "required" for an absent field unless this is a partial update.
    /// An explicit `null` is rejected in every mode.
    pub fn require<T>(&self, errors: &mut FieldErrors, field: &str, value: &Option<Option<T>>) {
        match value {
            Some(Some(_)) => {}
            Some(None) => errors.add_once(field, "This field may not be null."),
            None if !self.is_partial() => errors.add_once(field, "This field is required."),
            None => {}
        }
    }

    /// Like [`WriteMode::require`], and a present value may not be blank
    pub fn require_text(&self, errors: &mut FieldErrors, field: &str, value: &Option<Option<String>>) {
        match value {
            Some(Some(text)) if text.trim().is_empty() => {
                errors.add_once(field, "This field may not be blank.")
            }
            _ => self.require(errors, field, value),
        }
    }
}

/// Deserialize a body field so that an absent key stays `None` and an
/// explicit `null` becomes `Some(None)`. Use with `#[serde(default)]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Field checks that depend on the write mode
pub trait CheckFields {
    fn check_fields(&self, mode: WriteMode, errors: &mut FieldErrors);
}

/// JSON body that passed `validator` rules and [`CheckFields`].
///
/// Extraction never fails: the outcome is kept until the handler asks for it
/// with [`Validated::into_inner`], after its permission checks have run.
pub struct Validated<T> {
    mode: WriteMode,
    result: ApiResult<T>,
}

impl<T> Validated<T> {
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    pub fn into_inner(self) -> ApiResult<T> {
        self.result
    }
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for Validated<T>
where
    T: DeserializeOwned + Validate + CheckFields + Send + 'static,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mode = WriteMode::from_method(req.method());

        let result = match Json::<T>::from_request(req, state).await {
            Ok(Json(body)) => check(body, mode),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        };

        Ok(Validated { mode, result })
    }
}

fn check<T: Validate + CheckFields>(body: T, mode: WriteMode) -> ApiResult<T> {
    let mut errors = match body.validate() {
        Ok(()) => FieldErrors::new(),
        Err(errors) => convert_validation_errors(&errors),
    };
    body.check_fields(mode, &mut errors);
    errors.into_result()?;
    Ok(body)
}

fn convert_validation_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut result = FieldErrors::new();
    for (field, field_errors) in errors.field_errors() {
        for error in field_errors {
            result.add(&field, describe(error));
        }
    }
    result
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }

    match error.code.as_ref() {
        "length" => match error.params.get(&Cow::from("max")) {
            Some(max) => format!("Ensure this field has no more than {} characters.", max),
            None => "Ensure this field has a valid length.".to_string(),
        },
        "email" => "Enter a valid email address.".to_string(),
        code => format!("Invalid value ({}).", code),
    }
}

/// Push a `validator` rule failure from hand-run checks into `errors`
pub fn add_validation_error(errors: &mut FieldErrors, field: &str, error: &ValidationError) {
    errors.add(field, describe(error));
}
