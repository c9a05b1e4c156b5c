//! Field validators shared by every entry point that accepts user data
//!
//! The functions here have the `fn(&T) -> Result<(), ValidationError>` shape so
//! request types can reference them from `#[validate(custom(...))]`.

use std::borrow::Cow;

use chrono::{Datelike, Utc};
use validator::ValidationError;

/// Maximum username length
pub const USERNAME_MAX_LENGTH: u64 = 150;

/// Maximum email length
pub const EMAIL_MAX_LENGTH: u64 = 254;

/// Maximum first/last name length
pub const PERSON_NAME_MAX_LENGTH: u64 = 150;

/// Maximum category/genre/title name length
pub const NAME_MAX_LENGTH: u64 = 256;

/// Maximum slug length
pub const SLUG_MAX_LENGTH: u64 = 50;

/// Usernames that can never be registered.
///
/// `me` collides with the `/users/me/` route; the rest read as staff accounts.
pub const RESERVED_USERNAMES: &[&str] = &["me", "admin", "administrator", "moderator", "root"];

/// Allowed username characters: ASCII letters, digits and `_ . @ + -`
fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-')
}

/// Validate a username against the allowed pattern and the reserved list
pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || !value.chars().all(is_username_char) {
        return Err(ValidationError::new("username_pattern").with_message(Cow::from(
            "Username may contain only letters, digits and @/./+/-/_ characters.",
        )));
    }

    if RESERVED_USERNAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(value))
    {
        return Err(ValidationError::new("username_reserved")
            .with_message(Cow::from(format!("Username \"{}\" is not allowed.", value))));
    }

    Ok(())
}

/// Validate a release year against the current calendar year
pub fn validate_year(value: &i64) -> Result<(), ValidationError> {
    validate_year_against(*value, Utc::now().year() as i64)
}

/// Validate a release year against an explicit current year
pub fn validate_year_against(value: i64, current_year: i64) -> Result<(), ValidationError> {
    if value > current_year {
        return Err(ValidationError::new("year_in_future").with_message(Cow::from(format!(
            "Release year {} cannot be later than the current year {}.",
            value, current_year
        ))));
    }
    Ok(())
}

/// Validate a category/genre slug: `^[-a-zA-Z0-9_]+$`
pub fn validate_slug(value: &str) -> Result<(), ValidationError> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if !valid {
        return Err(ValidationError::new("slug").with_message(Cow::from(
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        )));
    }
    Ok(())
}
