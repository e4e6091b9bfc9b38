use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::backend::{tables::RATINGS, BackendError, Db, Query};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recipe_id: Uuid,
    pub rating: i16,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
struct RatingUpsert {
    user_id: Uuid,
    recipe_id: Uuid,
    rating: i16,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

/// Creates or replaces the caller's rating for a recipe.
pub async fn upsert(db: &Db<'_>, user_id: Uuid, recipe_id: Uuid, rating: i16) -> Result<Rating, BackendError> {
    let row = RatingUpsert {
        user_id,
        recipe_id,
        rating,
        updated_at: OffsetDateTime::now_utc(),
    };
    db.upsert(RATINGS, &row, &["user_id", "recipe_id"]).await
}

pub async fn find(db: &Db<'_>, user_id: Uuid, recipe_id: Uuid) -> Result<Option<Rating>, BackendError> {
    db.fetch_optional(
        &Query::from(RATINGS)
            .eq("user_id", user_id)
            .eq("recipe_id", recipe_id),
    )
    .await
}

pub async fn list_for_recipe(db: &Db<'_>, recipe_id: Uuid) -> Result<Vec<Rating>, BackendError> {
    db.fetch_all(&Query::from(RATINGS).eq("recipe_id", recipe_id))
        .await
}

pub async fn count_by_user(db: &Db<'_>, user_id: Uuid) -> Result<u64, BackendError> {
    db.count(&Query::from(RATINGS).eq("user_id", user_id)).await
}
