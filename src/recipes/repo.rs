use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::backend::{tables::RECIPES, BackendError, Db, Order, Query};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub prep_time: Option<i32>,
    #[serde(default)]
    pub cook_time: Option<i32>,
    #[serde(default)]
    pub servings: Option<i32>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRecipe {
    pub user_id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub servings: Option<i32>,
    pub category: Option<String>,
    pub is_public: bool,
}

/// Partial update; unset fields are left untouched.
#[derive(Debug, Default, Serialize)]
pub struct RecipePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cook_time: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servings: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// The public listing. `is_public = true` is applied before any user terms.
pub fn listing_query(filter: &RecipeFilter) -> Query {
    let mut q = Query::from(RECIPES).eq("is_public", true);
    if let Some(term) = &filter.search {
        q = q.search(&["title", "description"], term);
    }
    if let Some(category) = filter.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        q = q.eq("category", category);
    }
    q.order_by("created_at", Order::Desc)
        .limit(filter.limit)
        .offset(filter.offset)
}

pub async fn list_public(db: &Db<'_>, filter: &RecipeFilter) -> Result<Vec<Recipe>, BackendError> {
    db.fetch_all(&listing_query(filter)).await
}

pub async fn find_by_id(db: &Db<'_>, id: Uuid) -> Result<Option<Recipe>, BackendError> {
    db.fetch_optional(&Query::from(RECIPES).eq("id", id)).await
}

/// Every recipe carrying `slug`, newest first.
pub async fn list_by_slug(db: &Db<'_>, slug: &str) -> Result<Vec<Recipe>, BackendError> {
    db.fetch_all(
        &Query::from(RECIPES)
            .eq("slug", slug)
            .order_by("created_at", Order::Desc),
    )
    .await
}

pub async fn find_many(db: &Db<'_>, ids: &[Uuid]) -> Result<Vec<Recipe>, BackendError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    db.fetch_all(&Query::from(RECIPES).in_list("id", ids)).await
}

pub async fn list_by_user(db: &Db<'_>, user_id: Uuid, limit: Option<usize>) -> Result<Vec<Recipe>, BackendError> {
    let mut q = Query::from(RECIPES)
        .eq("user_id", user_id)
        .order_by("created_at", Order::Desc);
    if let Some(n) = limit {
        q = q.limit(n);
    }
    db.fetch_all(&q).await
}

pub async fn count_by_user(db: &Db<'_>, user_id: Uuid) -> Result<u64, BackendError> {
    db.count(&Query::from(RECIPES).eq("user_id", user_id)).await
}

pub async fn create(db: &Db<'_>, recipe: &NewRecipe) -> Result<Recipe, BackendError> {
    db.insert(RECIPES, recipe).await
}

pub async fn update(
    db: &Db<'_>,
    id: Uuid,
    owner: Uuid,
    patch: &RecipePatch,
) -> Result<Option<Recipe>, BackendError> {
    let q = Query::from(RECIPES).eq("id", id).eq("user_id", owner);
    let mut rows = db.update(&q, patch).await?;
    Ok(rows.pop())
}

pub async fn delete(db: &Db<'_>, id: Uuid, owner: Uuid) -> Result<bool, BackendError> {
    let q = Query::from(RECIPES).eq("id", id).eq("user_id", owner);
    Ok(db.delete(&q).await? > 0)
}
