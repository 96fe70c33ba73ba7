use axum::{extract::State, Json};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::auth::jwt::AuthUser;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::users::store::StoreError;

/// Public part of the profile returned to the owning user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub bio: String,
    pub avatar_url: String,
    pub preferences: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ApiResponse<Profile>>, ApiError> {
    let user = match state.users.get_by_id(user_id).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            warn!(%user_id, "token subject no longer exists");
            return Err(ApiError::InvalidToken("Invalid or expired token".into()));
        }
        Err(e) => return Err(ApiError::Internal(e.into())),
    };

    Ok(ApiResponse::success(Profile {
        id: user.id,
        email: user.email,
        display_name: user.display_name,
        bio: user.bio,
        avatar_url: user.avatar_url,
        preferences: user.preferences,
        created_at: user.created_at,
        updated_at: user.updated_at,
        last_login_at: user.last_login_at,
    }))
}
