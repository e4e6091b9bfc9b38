use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::backend::{tables::PROFILES, BackendError, Db, Query};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub username: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewProfile {
    pub id: Uuid,
    pub display_name: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct ProfilePatch {
    pub display_name: String,
    pub username: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub async fn find_by_id(db: &Db<'_>, id: Uuid) -> Result<Option<Profile>, BackendError> {
    db.fetch_optional(&Query::from(PROFILES).eq("id", id)).await
}

pub async fn find_many(db: &Db<'_>, ids: &[Uuid]) -> Result<Vec<Profile>, BackendError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    db.fetch_all(&Query::from(PROFILES).in_list("id", ids)).await
}

pub async fn create(db: &Db<'_>, profile: &NewProfile) -> Result<Profile, BackendError> {
    db.insert(PROFILES, profile).await
}

pub async fn update(db: &Db<'_>, id: Uuid, patch: &ProfilePatch) -> Result<Option<Profile>, BackendError> {
    let mut rows = db.update(&Query::from(PROFILES).eq("id", id), patch).await?;
    Ok(rows.pop())
}
