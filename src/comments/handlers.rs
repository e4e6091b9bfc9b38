use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CommentView, CreateCommentRequest, ListCommentsParams, UpdateCommentRequest},
    repo::{self, Comment},
    services::{add, clean_content, with_authors, CommentError},
};
use crate::{
    auth::extractors::AuthUser, backend::Db, error::ApiError, recipes::services::find_visible,
    state::AppState,
};

pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes/:id/comments", get(list_comments).post(add_comment))
        .route("/comments/:id", patch(update_comment).delete(delete_comment))
        .route("/comments/:id/replies", get(list_replies))
}

fn viewer_db<'a>(state: &'a AppState, viewer: &'a Option<AuthUser>) -> Db<'a> {
    match viewer {
        Some(u) => state.as_user(u),
        None => state.anon(),
    }
}

#[instrument(skip(state, viewer))]
pub async fn list_comments(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(recipe_id): Path<Uuid>,
    Query(params): Query<ListCommentsParams>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    let db = viewer_db(&state, &viewer);
    find_visible(&db, recipe_id, viewer.as_ref().map(AuthUser::id))
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe not found"))?;

    let comments = repo::list_for_recipe(&db, recipe_id, params.roots_only).await.map_err(|e| {
        error!(error = %e, %recipe_id, "list comments failed");
        ApiError::from(e)
    })?;
    Ok(Json(with_authors(&db, comments).await?))
}

#[instrument(skip(state, viewer))]
pub async fn list_replies(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    let db = viewer_db(&state, &viewer);
    let parent = repo::find_by_id(&db, comment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    find_visible(&db, parent.recipe_id, viewer.as_ref().map(AuthUser::id))
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe not found"))?;

    let replies = repo::list_replies(&db, comment_id).await?;
    Ok(Json(with_authors(&db, replies).await?))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id()))]
pub async fn add_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(recipe_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let db = state.as_user(&user);
    find_visible(&db, recipe_id, Some(user.id()))
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe not found"))?;

    let comment = add(&db, user.id(), recipe_id, payload).await.map_err(|e| {
        match &e {
            CommentError::Invalid(msg) => warn!(%msg, "comment rejected"),
            CommentError::Backend(err) => error!(error = %err, "add comment failed"),
        }
        ApiError::from(e)
    })?;
    info!(comment_id = %comment.id, %recipe_id, "comment added");

    let mut views = with_authors(&db, vec![comment]).await?;
    let view = views
        .pop()
        .ok_or_else(|| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Comment vanished"))?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id()))]
pub async fn update_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let content = clean_content(&payload.content)?;
    let comment = repo::update_content(&state.as_user(&user), id, user.id(), &content)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    info!(comment_id = %id, "comment edited");
    Ok(Json(comment))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn delete_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !repo::delete(&state.as_user(&user), id, user.id()).await? {
        return Err(ApiError::not_found("Comment not found"));
    }
    info!(comment_id = %id, "comment deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_app;
    use crate::test_support::{call, json_request, sign_up};
    use serde_json::json;

    #[tokio::test]
    async fn comment_thread_over_http() {
        let state = AppState::fake();
        let cook = sign_up(&state, "cook").await;
        let guest = sign_up(&state, "guest").await;
        let app = build_app(state);

        let (_, created) = call(
            &app,
            json_request(
                "POST",
                "/api/v1/recipes",
                Some(&cook.access_token),
                Some(json!({ "title": "Ramen", "description": "Noodles", "ingredients": ["noodles"], "steps": ["boil"] })),
            ),
        )
        .await;
        let uri = format!("/api/v1/recipes/{}/comments", created["id"].as_str().unwrap());

        let (status, root) = call(
            &app,
            json_request("POST", &uri, Some(&guest.access_token), Some(json!({ "content": " Yum " }))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(root["content"], "Yum");
        let root_id = root["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &app,
            json_request(
                "POST",
                &uri,
                Some(&cook.access_token),
                Some(json!({ "content": "Thanks!", "parent_id": root_id })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(
            &app,
            json_request("POST", &uri, Some(&cook.access_token), Some(json!({ "content": "   " }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Comment content is required");

        let (_, listed) = call(&app, json_request("GET", &uri, None, None)).await;
        let contents: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["content"].as_str().unwrap())
            .collect();
        assert_eq!(contents, ["Yum", "Thanks!"]);

        let (_, roots) = call(&app, json_request("GET", &format!("{uri}?roots_only=true"), None, None)).await;
        assert_eq!(roots.as_array().unwrap().len(), 1);

        let (_, replies) = call(
            &app,
            json_request("GET", &format!("/api/v1/comments/{root_id}/replies"), None, None),
        )
        .await;
        assert_eq!(replies.as_array().unwrap().len(), 1);

        let comment_uri = format!("/api/v1/comments/{root_id}");
        let edit = json!({ "content": "Yum yum" });
        let (status, _) = call(&app, json_request("PATCH", &comment_uri, Some(&cook.access_token), Some(edit.clone()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = call(&app, json_request("PATCH", &comment_uri, Some(&guest.access_token), Some(edit))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content"], "Yum yum");

        let (status, _) = call(&app, json_request("DELETE", &comment_uri, Some(&cook.access_token), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, json_request("DELETE", &comment_uri, Some(&guest.access_token), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn replies_under_private_recipe_stay_hidden() {
        let state = AppState::fake();
        let cook = sign_up(&state, "cook").await;
        let other = sign_up(&state, "other").await;
        let app = build_app(state);

        let (_, created) = call(
            &app,
            json_request(
                "POST",
                "/api/v1/recipes",
                Some(&cook.access_token),
                Some(json!({ "title": "Secret", "description": "Hush", "ingredients": ["salt"], "steps": ["wait"], "is_public": false })),
            ),
        )
        .await;
        let uri = format!("/api/v1/recipes/{}/comments", created["id"].as_str().unwrap());
        let token = Some(cook.access_token.as_str());

        let (_, root) = call(&app, json_request("POST", &uri, token, Some(json!({ "content": "note to self" })))).await;
        let root_id = root["id"].as_str().unwrap().to_string();
        let (status, _) = call(
            &app,
            json_request("POST", &uri, token, Some(json!({ "content": "private reply", "parent_id": root_id }))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let replies_uri = format!("/api/v1/comments/{root_id}/replies");
        let (status, _) = call(&app, json_request("GET", &replies_uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, json_request("GET", &replies_uri, Some(&other.access_token), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&app, json_request("GET", &replies_uri, token, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["content"], "private reply");

        let unknown = format!("/api/v1/comments/{}/replies", Uuid::new_v4());
        let (status, _) = call(&app, json_request("GET", &unknown, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
