//! Bearer-token (or `jwt_token` cookie) extraction.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use uuid::Uuid;

use crate::auth::jwt;
use crate::error::ApiError;
use crate::AppState;

/// Cookie consulted when no `Authorization` header is present.
pub const TOKEN_COOKIE: &str = "jwt_token";

/// Authenticated user extracted from the request credentials.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = match parts.headers.get(AUTHORIZATION) {
            Some(header) => {
                let header = header
                    .to_str()
                    .map_err(|_| ApiError::unauthorized("Invalid Authorization header"))?;
                header
                    .strip_prefix("Bearer ")
                    .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?
            }
            None => cookie_value(parts, TOKEN_COOKIE).ok_or_else(|| {
                ApiError::unauthorized("Authorization header or jwt_token cookie required")
            })?,
        };

        let user_id = jwt::verify_token(&state.config.jwt_secret, token)?;

        // Tokens outlive accounts; make sure the user still exists.
        if state.store.get_user_by_id(user_id).await?.is_none() {
            return Err(ApiError::unauthorized("User does not exist"));
        }

        Ok(AuthUser { user_id })
    }
}

fn cookie_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}
