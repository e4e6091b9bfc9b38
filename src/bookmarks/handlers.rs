use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::{
    dto::{BookmarkEntry, BookmarkStatus},
    repo,
    services::{list_with_recipes, toggle},
};
use crate::{
    auth::extractors::AuthUser, backend::Db, error::ApiError, recipes::services::find_visible,
    state::AppState,
};

pub fn bookmark_routes() -> Router<AppState> {
    Router::new()
        .route("/bookmarks", get(list_bookmarks))
        .route(
            "/recipes/:id/bookmark",
            get(bookmark_status).put(add_bookmark).delete(remove_bookmark),
        )
        .route("/recipes/:id/bookmark/toggle", post(toggle_bookmark))
}

async fn require_recipe(db: &Db<'_>, id: Uuid, user: &AuthUser) -> Result<(), ApiError> {
    find_visible(db, id, Some(user.id()))
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::not_found("Recipe not found"))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn list_bookmarks(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<BookmarkEntry>>, ApiError> {
    let entries = list_with_recipes(&state.as_user(&user), user.id())
        .await
        .map_err(|e| {
            error!(error = %e, "list bookmarks failed");
            ApiError::from(e)
        })?;
    Ok(Json(entries))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn bookmark_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(recipe_id): Path<Uuid>,
) -> Result<Json<BookmarkStatus>, ApiError> {
    let found = repo::find(&state.as_user(&user), user.id(), recipe_id).await?;
    Ok(Json(BookmarkStatus {
        recipe_id,
        bookmarked: found.is_some(),
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn add_bookmark(
    State(state): State<AppState>,
    user: AuthUser,
    Path(recipe_id): Path<Uuid>,
) -> Result<Json<BookmarkStatus>, ApiError> {
    let db = state.as_user(&user);
    require_recipe(&db, recipe_id, &user).await?;
    repo::add(&db, user.id(), recipe_id).await.map_err(|e| {
        error!(error = %e, %recipe_id, "add bookmark failed");
        ApiError::from(e)
    })?;
    info!(%recipe_id, "bookmarked");
    Ok(Json(BookmarkStatus {
        recipe_id,
        bookmarked: true,
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn remove_bookmark(
    State(state): State<AppState>,
    user: AuthUser,
    Path(recipe_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    repo::remove(&state.as_user(&user), user.id(), recipe_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn toggle_bookmark(
    State(state): State<AppState>,
    user: AuthUser,
    Path(recipe_id): Path<Uuid>,
) -> Result<Json<BookmarkStatus>, ApiError> {
    let db = state.as_user(&user);
    require_recipe(&db, recipe_id, &user).await?;
    let bookmarked = toggle(&db, user.id(), recipe_id).await?;
    info!(%recipe_id, bookmarked, "bookmark toggled");
    Ok(Json(BookmarkStatus {
        recipe_id,
        bookmarked,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_app;
    use crate::test_support::{call, json_request, sign_up};
    use serde_json::json;

    #[tokio::test]
    async fn bookmark_flow_over_http() {
        let state = AppState::fake();
        let cook = sign_up(&state, "cook").await;
        let fan = sign_up(&state, "fan").await;
        let app = build_app(state);

        let (_, created) = call(
            &app,
            json_request(
                "POST",
                "/api/v1/recipes",
                Some(&cook.access_token),
                Some(json!({ "title": "Pho", "description": "Broth", "ingredients": ["beef"], "steps": ["simmer"] })),
            ),
        )
        .await;
        let base = format!("/api/v1/recipes/{}/bookmark", created["id"].as_str().unwrap());
        let token = Some(fan.access_token.as_str());

        for _ in 0..2 {
            let (status, body) = call(&app, json_request("PUT", &base, token, None)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["bookmarked"], true);
        }
        let (_, listed) = call(&app, json_request("GET", "/api/v1/bookmarks", token, None)).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["recipe"]["title"], "Pho");

        let (_, body) = call(&app, json_request("POST", &format!("{base}/toggle"), token, None)).await;
        assert_eq!(body["bookmarked"], false);
        let (_, body) = call(&app, json_request("GET", &base, token, None)).await;
        assert_eq!(body["bookmarked"], false);

        let (status, _) = call(&app, json_request("DELETE", &base, token, None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn unknown_recipe_cannot_be_bookmarked() {
        let state = AppState::fake();
        let fan = sign_up(&state, "fan").await;
        let app = build_app(state);

        let uri = format!("/api/v1/recipes/{}/bookmark", Uuid::new_v4());
        let (status, _) = call(&app, json_request("PUT", &uri, Some(&fan.access_token), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
