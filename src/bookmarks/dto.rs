use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::recipes::dto::RecipeSummary;

#[derive(Debug, Serialize)]
pub struct BookmarkStatus {
    pub recipe_id: Uuid,
    pub bookmarked: bool,
}

/// A bookmark joined with the recipe it points at.
#[derive(Debug, Serialize)]
pub struct BookmarkEntry {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub recipe: RecipeSummary,
}
