use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{MyRating, RateRequest, RatingSummary},
    repo::{self, Rating},
    services::{summary_for, validate},
};
use crate::{
    auth::extractors::AuthUser, error::ApiError, recipes::services::find_visible, state::AppState,
};

pub fn rating_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes/:id/ratings", get(rating_summary))
        .route("/recipes/:id/rating", get(my_rating).put(rate_recipe))
}

#[instrument(skip(state, viewer))]
pub async fn rating_summary(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(recipe_id): Path<Uuid>,
) -> Result<Json<RatingSummary>, ApiError> {
    let db = match &viewer {
        Some(u) => state.as_user(u),
        None => state.anon(),
    };
    find_visible(&db, recipe_id, viewer.as_ref().map(AuthUser::id))
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe not found"))?;
    let summary = summary_for(&db, recipe_id).await.map_err(|e| {
        error!(error = %e, %recipe_id, "rating summary failed");
        ApiError::from(e)
    })?;
    Ok(Json(summary))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn my_rating(
    State(state): State<AppState>,
    user: AuthUser,
    Path(recipe_id): Path<Uuid>,
) -> Result<Json<MyRating>, ApiError> {
    let found = repo::find(&state.as_user(&user), user.id(), recipe_id).await?;
    Ok(Json(MyRating {
        recipe_id,
        rating: found.map(|r| r.rating),
    }))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id()))]
pub async fn rate_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    Path(recipe_id): Path<Uuid>,
    Json(payload): Json<RateRequest>,
) -> Result<Json<Rating>, ApiError> {
    let value = validate(payload.rating).map_err(|msg| {
        warn!(rating = payload.rating, "rating rejected");
        ApiError::bad_request(msg)
    })?;

    let db = state.as_user(&user);
    find_visible(&db, recipe_id, Some(user.id()))
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe not found"))?;

    let rating = repo::upsert(&db, user.id(), recipe_id, value)
        .await
        .map_err(|e| {
            error!(error = %e, %recipe_id, "save rating failed");
            ApiError::from(e)
        })?;
    info!(%recipe_id, rating = value, "recipe rated");
    Ok(Json(rating))
}
