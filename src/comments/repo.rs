use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::backend::{tables::COMMENTS, BackendError, Db, Order, Query};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub struct NewComment {
    pub recipe_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct ContentPatch<'a> {
    content: &'a str,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

fn owned(id: Uuid, user_id: Uuid) -> Query {
    Query::from(COMMENTS).eq("id", id).eq("user_id", user_id)
}

pub async fn create(db: &Db<'_>, comment: &NewComment) -> Result<Comment, BackendError> {
    db.insert(COMMENTS, comment).await
}

pub async fn find_by_id(db: &Db<'_>, id: Uuid) -> Result<Option<Comment>, BackendError> {
    db.fetch_optional(&Query::from(COMMENTS).eq("id", id)).await
}

/// Comments on a recipe, oldest first. Replies are included unless
/// `roots_only` is set.
pub async fn list_for_recipe(db: &Db<'_>, recipe_id: Uuid, roots_only: bool) -> Result<Vec<Comment>, BackendError> {
    let mut q = Query::from(COMMENTS).eq("recipe_id", recipe_id);
    if roots_only {
        q = q.is_null("parent_id");
    }
    db.fetch_all(&q.order_by("created_at", Order::Asc)).await
}

pub async fn list_replies(db: &Db<'_>, parent_id: Uuid) -> Result<Vec<Comment>, BackendError> {
    db.fetch_all(
        &Query::from(COMMENTS)
            .eq("parent_id", parent_id)
            .order_by("created_at", Order::Asc),
    )
    .await
}

pub async fn update_content(
    db: &Db<'_>,
    id: Uuid,
    user_id: Uuid,
    content: &str,
) -> Result<Option<Comment>, BackendError> {
    let patch = ContentPatch {
        content,
        updated_at: OffsetDateTime::now_utc(),
    };
    let mut rows = db.update(&owned(id, user_id), &patch).await?;
    Ok(rows.pop())
}

pub async fn delete(db: &Db<'_>, id: Uuid, user_id: Uuid) -> Result<bool, BackendError> {
    Ok(db.delete(&owned(id, user_id)).await? > 0)
}
