//! HS256 bearer tokens carrying the user id in `sub`.

use chat_common::id::{prefix, prefixed_ulid};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Lifetime of tokens minted by [`mint_token`].
pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Mint a token for `user_id`. Login lives outside the chat service; this is
/// used by tests and local tooling.
pub fn mint_token(secret: &str, user_id: Uuid) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        jti: Some(prefixed_ulid(prefix::TOKEN)),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validate signature and expiry, and return the user id from `sub`.
pub fn verify_token(secret: &str, token: &str) -> Result<Uuid, ApiError> {
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        tracing::debug!(?e, "token validation failed");
        ApiError::unauthorized("Invalid token")
    })?;

    Uuid::parse_str(&data.claims.sub).map_err(|_| ApiError::unauthorized("Invalid token subject"))
}
