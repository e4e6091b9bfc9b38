use serde::{Deserialize, Serialize};

use super::repo::Profile;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: String,
    pub username: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Author fields shown next to recipes and comments.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuthorSummary {
    pub display_name: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl From<&Profile> for AuthorSummary {
    fn from(p: &Profile) -> Self {
        Self {
            display_name: p.display_name.clone(),
            username: p.username.clone(),
            avatar_url: p.avatar_url.clone(),
        }
    }
}
