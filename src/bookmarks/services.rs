use std::collections::HashMap;

use uuid::Uuid;

use super::dto::BookmarkEntry;
use super::repo;
use crate::backend::{BackendError, Db};
use crate::recipes::{dto::RecipeSummary, repo as recipes, services::visible_to};

/// Flips the bookmark for the pair and returns the new state.
pub async fn toggle(db: &Db<'_>, user_id: Uuid, recipe_id: Uuid) -> Result<bool, BackendError> {
    if repo::remove(db, user_id, recipe_id).await? {
        return Ok(false);
    }
    repo::add(db, user_id, recipe_id).await?;
    Ok(true)
}

/// The caller's bookmarks, newest first. Bookmarks whose recipe was deleted or
/// made private by its owner are left out.
pub async fn list_with_recipes(db: &Db<'_>, user_id: Uuid) -> Result<Vec<BookmarkEntry>, BackendError> {
    let bookmarks = repo::list_by_user(db, user_id).await?;
    let ids: Vec<Uuid> = bookmarks.iter().map(|b| b.recipe_id).collect();
    let by_id: HashMap<Uuid, RecipeSummary> = recipes::find_many(db, &ids)
        .await?
        .iter()
        .filter(|r| visible_to(r, Some(user_id)))
        .map(|r| (r.id, r.into()))
        .collect();

    Ok(bookmarks
        .into_iter()
        .filter_map(|b| {
            by_id.get(&b.recipe_id).map(|recipe| BookmarkEntry {
                id: b.id,
                created_at: b.created_at,
                recipe: recipe.clone(),
            })
        })
        .collect())
}
