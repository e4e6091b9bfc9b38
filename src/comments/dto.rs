use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::Comment;
use crate::profiles::dto::AuthorSummary;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListCommentsParams {
    #[serde(default)]
    pub roots_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<AuthorSummary>,
}
