//! Session token verification
//!
//! Tokens are issued elsewhere; handlers only need the authenticated user
//! id out of a Bearer JWT.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, Validation};
use serde::{Deserialize, Serialize};

use types::ids::UserId;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub user_id: UserId,
}

pub struct AuthenticatedUser {
    pub user_id: UserId,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Authorization")
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".into()))?;
        let header = header
            .to_str()
            .map_err(|_| ApiError::Unauthorized("malformed Authorization header".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected a Bearer token".into()))?;

        let data = decode::<Claims>(token, &state.auth.decoding, &Validation::default())
            .map_err(|e| ApiError::Unauthorized(format!("invalid token: {}", e)))?;

        // The token must name a registered user.
        if state.store.user(data.claims.user_id).is_none() {
            return Err(ApiError::Unauthorized("unknown user".into()));
        }
        Ok(AuthenticatedUser {
            user_id: data.claims.user_id,
        })
    }
}
