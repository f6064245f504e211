use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::TokenError;

/// Seconds of validity left under which clients are told to renew.
pub const RENEWAL_THRESHOLD_SECONDS: i64 = 180;

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: String, // user id
    pub iat: usize,
    pub exp: usize,
}

/// Outcome of checking a still-valid token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    Ok,
    RenewalRecommended,
}

pub fn create_token(
    user_id: &str,
    secret: &[u8],
    expires_in_seconds: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    create_token_at(user_id, secret, expires_in_seconds, Utc::now())
}

/// Issue an HS256 token as if the clock read `now`.
pub fn create_token_at(
    user_id: &str,
    secret: &[u8],
    expires_in_seconds: i64,
    now: DateTime<Utc>,
) -> Result<String, jsonwebtoken::errors::Error> {
    if user_id.is_empty() {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidSubject.into());
    }

    let iat = now.timestamp() as usize;
    let exp = (now + Duration::seconds(expires_in_seconds)).timestamp() as usize;
    let claims = TokenClaims {
        sub: user_id.to_string(),
        iat,
        exp,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
}

/// Verify signature and format, then expiry against `now`.
///
/// Expiry is checked here instead of inside jsonwebtoken so the clock can be
/// injected; there is no leeway.
fn verify_at(token: &str, secret: &[u8], now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.leeway = 0;

    let claims = decode::<TokenClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|_| TokenError::Invalid)?
        .claims;

    if now.timestamp() >= claims.exp as i64 {
        return Err(TokenError::Expired);
    }
    if claims.sub.is_empty() {
        return Err(TokenError::MissingClaim);
    }
    Ok(claims)
}

/// Return the user id carried by a valid token.
pub fn decode_token<T: Into<String>>(token: T, secret: &[u8]) -> Result<String, TokenError> {
    decode_token_at(&token.into(), secret, Utc::now())
}

pub fn decode_token_at(
    token: &str,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<String, TokenError> {
    verify_at(token, secret, now).map(|claims| claims.sub)
}

pub fn expiry_status(token: &str, secret: &[u8]) -> Result<ExpiryStatus, TokenError> {
    expiry_status_at(token, secret, Utc::now())
}

pub fn expiry_status_at(
    token: &str,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<ExpiryStatus, TokenError> {
    let claims = verify_at(token, secret, now)?;
    let remaining = claims.exp as i64 - now.timestamp();
    if remaining < RENEWAL_THRESHOLD_SECONDS {
        Ok(ExpiryStatus::RenewalRecommended)
    } else {
        Ok(ExpiryStatus::Ok)
    }
}

/// Reissue a token for the same user with a fresh expiry.
///
/// Only still-valid tokens can be renewed.
pub fn renew_token(
    token: &str,
    secret: &[u8],
    expires_in_seconds: i64,
) -> Result<String, TokenError> {
    let user_id = decode_token(token, secret)?;
    create_token(&user_id, secret, expires_in_seconds).map_err(|_| TokenError::Invalid)
}
