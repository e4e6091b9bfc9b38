use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreateRecipeRequest, ListRecipesParams, RecipeDetails, UpdateRecipeRequest},
    repo::{self, Recipe, RecipeFilter},
    services::{
        find_visible_by_slug, validate_new, validate_patch, visible_to, with_author, CATEGORIES,
        MAX_PAGE,
    },
};
use crate::{auth::extractors::AuthUser, error::ApiError, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .route("/slugs/:slug", get(get_recipe_by_slug))
        .route("/categories", get(list_categories))
}

pub fn own_routes() -> Router<AppState> {
    Router::new().route("/me/recipes", get(list_own_recipes))
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    Query(p): Query<ListRecipesParams>,
) -> Result<Json<Vec<Recipe>>, ApiError> {
    let filter = RecipeFilter {
        search: p.search,
        category: p.category,
        limit: p.limit.clamp(1, MAX_PAGE),
        offset: p.offset,
    };
    let recipes = repo::list_public(&state.anon(), &filter).await.map_err(|e| {
        error!(error = %e, "list recipes failed");
        ApiError::from(e)
    })?;
    Ok(Json(recipes))
}

pub async fn list_categories() -> Json<Vec<&'static str>> {
    Json(CATEGORIES.to_vec())
}

async fn load_visible(
    state: &AppState,
    viewer: Option<&AuthUser>,
    found: Option<Recipe>,
) -> Result<Json<RecipeDetails>, ApiError> {
    let recipe = found
        .filter(|r| visible_to(r, viewer.map(AuthUser::id)))
        .ok_or_else(|| ApiError::not_found("Recipe not found"))?;
    let db = match viewer {
        Some(u) => state.as_user(u),
        None => state.anon(),
    };
    Ok(Json(with_author(&db, recipe).await?))
}

#[instrument(skip(state, viewer))]
pub async fn get_recipe(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<RecipeDetails>, ApiError> {
    let db = match &viewer {
        Some(u) => state.as_user(u),
        None => state.anon(),
    };
    let found = repo::find_by_id(&db, id).await.map_err(|e| {
        error!(error = %e, %id, "get recipe failed");
        ApiError::from(e)
    })?;
    load_visible(&state, viewer.as_ref(), found).await
}

#[instrument(skip(state, viewer))]
pub async fn get_recipe_by_slug(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(slug): Path<String>,
) -> Result<Json<RecipeDetails>, ApiError> {
    let db = match &viewer {
        Some(u) => state.as_user(u),
        None => state.anon(),
    };
    let found = find_visible_by_slug(&db, &slug, viewer.as_ref().map(AuthUser::id)).await?;
    load_visible(&state, viewer.as_ref(), found).await
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id()))]
pub async fn create_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Recipe>), ApiError> {
    let new = validate_new(user.id(), payload).map_err(|msg| {
        warn!(%msg, "recipe rejected");
        ApiError::bad_request(msg)
    })?;

    let recipe = repo::create(&state.as_user(&user), &new).await.map_err(|e| {
        error!(error = %e, "create recipe failed");
        ApiError::from(e)
    })?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/recipes/{}", recipe.id)) {
        headers.insert(header::LOCATION, location);
    }
    info!(recipe_id = %recipe.id, slug = %recipe.slug, "recipe created");
    Ok((StatusCode::CREATED, headers, Json(recipe)))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id()))]
pub async fn update_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRecipeRequest>,
) -> Result<Json<Recipe>, ApiError> {
    let patch = validate_patch(payload).map_err(ApiError::bad_request)?;
    let recipe = repo::update(&state.as_user(&user), id, user.id(), &patch)
        .await
        .map_err(|e| {
            error!(error = %e, %id, "update recipe failed");
            ApiError::from(e)
        })?
        .ok_or_else(|| ApiError::not_found("Recipe not found"))?;
    info!(recipe_id = %id, "recipe updated");
    Ok(Json(recipe))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !repo::delete(&state.as_user(&user), id, user.id()).await? {
        return Err(ApiError::not_found("Recipe not found"));
    }
    info!(recipe_id = %id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn list_own_recipes(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Recipe>>, ApiError> {
    Ok(Json(
        repo::list_by_user(&state.as_user(&user), user.id(), None).await?,
    ))
}
