use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::UpdateProfileRequest,
    repo::{self, Profile},
    services::{ensure_profile, validate_update},
};
use crate::{auth::extractors::AuthUser, error::ApiError, state::AppState};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_own_profile).put(update_own_profile))
        .route("/profiles/:id", get(get_profile))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn get_own_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Profile>, ApiError> {
    let profile = ensure_profile(&state.as_user(&user), &user.identity)
        .await
        .map_err(|e| {
            error!(error = %e, "load profile failed");
            ApiError::from(e)
        })?;
    Ok(Json(profile))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id()))]
pub async fn update_own_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    let patch = validate_update(payload).map_err(|fields| {
        warn!(?fields, "profile update rejected");
        ApiError::invalid_fields(fields)
    })?;

    let db = state.as_user(&user);
    ensure_profile(&db, &user.identity).await?;
    let profile = repo::update(&db, user.id(), &patch)
        .await
        .map_err(|e| {
            error!(error = %e, "update profile failed");
            ApiError::from(e)
        })?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    info!(username = %profile.username, "profile updated");
    Ok(Json(profile))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Profile>, ApiError> {
    repo::find_by_id(&state.anon(), id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Profile not found"))
}
