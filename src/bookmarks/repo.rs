use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::backend::{tables::BOOKMARKS, BackendError, Db, Order, Query};

pub const CONFLICT_KEY: [&str; 2] = ["user_id", "recipe_id"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recipe_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
struct NewBookmark {
    user_id: Uuid,
    recipe_id: Uuid,
}

fn pair(user_id: Uuid, recipe_id: Uuid) -> Query {
    Query::from(BOOKMARKS)
        .eq("user_id", user_id)
        .eq("recipe_id", recipe_id)
}

/// Idempotent: a second call for the same pair returns the existing row.
pub async fn add(db: &Db<'_>, user_id: Uuid, recipe_id: Uuid) -> Result<Bookmark, BackendError> {
    db.upsert(BOOKMARKS, &NewBookmark { user_id, recipe_id }, &CONFLICT_KEY)
        .await
}

pub async fn remove(db: &Db<'_>, user_id: Uuid, recipe_id: Uuid) -> Result<bool, BackendError> {
    Ok(db.delete(&pair(user_id, recipe_id)).await? > 0)
}

pub async fn find(db: &Db<'_>, user_id: Uuid, recipe_id: Uuid) -> Result<Option<Bookmark>, BackendError> {
    db.fetch_optional(&pair(user_id, recipe_id)).await
}

pub async fn list_by_user(db: &Db<'_>, user_id: Uuid) -> Result<Vec<Bookmark>, BackendError> {
    db.fetch_all(
        &Query::from(BOOKMARKS)
            .eq("user_id", user_id)
            .order_by("created_at", Order::Desc),
    )
    .await
}

pub async fn count_by_user(db: &Db<'_>, user_id: Uuid) -> Result<u64, BackendError> {
    db.count(&Query::from(BOOKMARKS).eq("user_id", user_id)).await
}
