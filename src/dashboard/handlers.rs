use axum::{extract::State, routing::get, Json, Router};
use tracing::{error, instrument};

use super::services::{load, Dashboard};
use crate::{auth::extractors::AuthUser, error::ApiError, state::AppState};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(get_dashboard))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn get_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Dashboard>, ApiError> {
    let dashboard = load(&state.as_user(&user), user.id()).await.map_err(|e| {
        error!(error = %e, "load dashboard failed");
        ApiError::from(e)
    })?;
    Ok(Json(dashboard))
}
