//! Internal registration surface
//!
//! Account registration proper lives outside the core; this endpoint is
//! what that collaborator calls to materialize a user row. It is mounted
//! under `/internal` and must not be exposed publicly.

use axum::{extract::State, Json};
use serde::Deserialize;

use types::user::User;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    #[serde(default)]
    pub messaging_handle: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let mut user = User::new(payload.name);
    user.messaging_handle = payload.messaging_handle;
    user.is_admin = payload.is_admin;
    state
        .store
        .insert_user(user.clone())
        .map_err(types::errors::OrderError::from)?;
    Ok(Json(user))
}
