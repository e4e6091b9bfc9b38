use serde::Serialize;
use uuid::Uuid;

use crate::backend::{BackendError, Db};
use crate::bookmarks::repo as bookmarks;
use crate::ratings::repo as ratings;
use crate::recipes::repo::{self as recipes, Recipe};

pub const RECENT: usize = 3;

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub recipes: u64,
    pub bookmarks: u64,
    pub ratings: u64,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub recent_recipes: Vec<Recipe>,
}

pub async fn load(db: &Db<'_>, user_id: Uuid) -> Result<Dashboard, BackendError> {
    let (recipe_count, bookmark_count, rating_count, recent) = tokio::try_join!(
        recipes::count_by_user(db, user_id),
        bookmarks::count_by_user(db, user_id),
        ratings::count_by_user(db, user_id),
        recipes::list_by_user(db, user_id, Some(RECENT)),
    )?;
    Ok(Dashboard {
        stats: DashboardStats {
            recipes: recipe_count,
            bookmarks: bookmark_count,
            ratings: rating_count,
        },
        recent_recipes: recent,
    })
}
