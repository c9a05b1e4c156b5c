//! Confirmation codes and token signing secret
//!
//! # Confirmation codes
//!
//! A code is [`CONFIRMATION_CODE_LENGTH`] distinct decimal digits drawn at
//! random. Registration stores it on the user and mails it; token issuance
//! compares the submitted code with the stored one.
//!
//! # Signing secret
//!
//! Access tokens are HMAC signed. The secret comes from configuration when
//! present; otherwise one is generated on first start and kept in the
//! `settings` table under [`SIGNING_SECRET_KEY`] so tokens stay valid across
//! restarts.

use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use sqlx::SqlitePool;
use tracing::info;

use crate::db::init::{get_setting, set_setting};
use crate::Result;

/// Number of digits in a confirmation code
pub const CONFIRMATION_CODE_LENGTH: usize = 6;

/// Settings table key for the generated signing secret
pub const SIGNING_SECRET_KEY: &str = "token_signing_secret";

const GENERATED_SECRET_LENGTH: usize = 64;

const DIGITS: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];

/// Generate a confirmation code of distinct random digits
pub fn generate_confirmation_code() -> String {
    let mut rng = rand::thread_rng();
    DIGITS
        .choose_multiple(&mut rng, CONFIRMATION_CODE_LENGTH)
        .collect()
}

/// Compare a submitted code with the stored one. No stored code never matches.
pub fn confirmation_code_matches(stored: Option<&str>, submitted: &str) -> bool {
    match stored {
        Some(stored) if !stored.is_empty() => stored == submitted,
        _ => false,
    }
}

/// Resolve the token signing secret
///
/// Uses `configured` when given, else loads the persisted secret, generating
/// and storing one on first use.
pub async fn load_signing_secret(pool: &SqlitePool, configured: Option<&str>) -> Result<String> {
    if let Some(secret) = configured {
        return Ok(secret.to_string());
    }

    match get_setting(pool, SIGNING_SECRET_KEY).await? {
        Some(secret) if !secret.is_empty() => Ok(secret),
        _ => initialize_signing_secret(pool).await,
    }
}

/// Generate a random signing secret and persist it
pub async fn initialize_signing_secret(pool: &SqlitePool) -> Result<String> {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_LENGTH)
        .map(char::from)
        .collect();

    set_setting(pool, SIGNING_SECRET_KEY, &secret).await?;
    info!("Generated new token signing secret");

    Ok(secret)
}
