//! Bearer access tokens
//!
//! HS256 signed JWTs bound to a user id. Nothing is stored server side: a
//! token is valid while its signature checks out and `exp` has not passed.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Only token type this service issues or accepts
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: String,
    pub exp: u64,
    pub iat: u64,
    pub jti: String,
    pub user_id: i64,
}

/// Issues and verifies access tokens with one shared secret
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: &str, lifetime_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
        }
    }

    /// Issue an access token for `user_id`
    pub fn issue(&self, user_id: i64) -> ApiResult<String> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            exp: now + self.lifetime_secs,
            iat: now,
            jti: Uuid::new_v4().simple().to_string(),
            user_id,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verify signature, expiry and token type; returns the claims
    pub fn verify(&self, token: &str) -> ApiResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| ApiError::InvalidToken(e.to_string()))?;

        if data.claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(ApiError::InvalidToken(format!(
                "unexpected token type {}",
                data.claims.token_type
            )));
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let issuer = TokenIssuer::new("test-secret", 3600);
        let token = issuer.issue(42).unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.token_type, "access");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.jti.len(), 32);
    }

    #[test]
    fn test_each_token_has_unique_id() {
        let issuer = TokenIssuer::new("test-secret", 3600);
        let a = issuer.verify(&issuer.issue(1).unwrap()).unwrap();
        let b = issuer.verify(&issuer.issue(1).unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenIssuer::new("one", 3600).issue(1).unwrap();
        let result = TokenIssuer::new("two", 3600).verify(&token);
        assert!(matches!(result, Err(ApiError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = TokenIssuer::new("test-secret", 3600);
        let claims = Claims {
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            exp: 1_000,
            iat: 0,
            jti: "x".to_string(),
            user_id: 1,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &issuer.encoding).unwrap();
        assert!(matches!(issuer.verify(&token), Err(ApiError::InvalidToken(_))));
    }

    #[test]
    fn test_other_token_type_rejected() {
        let issuer = TokenIssuer::new("test-secret", 3600);
        let claims = Claims {
            token_type: "refresh".to_string(),
            exp: Utc::now().timestamp() as u64 + 3600,
            iat: 0,
            jti: "x".to_string(),
            user_id: 1,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &issuer.encoding).unwrap();
        assert!(matches!(issuer.verify(&token), Err(ApiError::InvalidToken(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        let issuer = TokenIssuer::new("test-secret", 3600);
        assert!(issuer.verify("not.a.token").is_err());
    }
}
