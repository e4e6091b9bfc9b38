use uuid::Uuid;

use super::dto::{CommentView, CreateCommentRequest};
use super::repo::{self, Comment, NewComment};
use crate::backend::{BackendError, Db};
use crate::error::ApiError;
use crate::profiles::services::authors;

#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("{0}")]
    Invalid(&'static str),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<CommentError> for ApiError {
    fn from(e: CommentError) -> Self {
        match e {
            CommentError::Invalid(msg) => ApiError::bad_request(msg),
            CommentError::Backend(e) => e.into(),
        }
    }
}

pub fn clean_content(raw: &str) -> Result<String, CommentError> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(CommentError::Invalid("Comment content is required"));
    }
    Ok(content.to_string())
}

/// Adds a comment. A reply's parent has to sit on the same recipe.
pub async fn add(
    db: &Db<'_>,
    user_id: Uuid,
    recipe_id: Uuid,
    req: CreateCommentRequest,
) -> Result<Comment, CommentError> {
    let content = clean_content(&req.content)?;

    if let Some(parent_id) = req.parent_id {
        let parent = repo::find_by_id(db, parent_id).await?;
        if !parent.is_some_and(|p| p.recipe_id == recipe_id) {
            return Err(CommentError::Invalid(
                "Parent comment must belong to the same recipe",
            ));
        }
    }

    let comment = NewComment {
        recipe_id,
        user_id,
        content,
        parent_id: req.parent_id,
    };
    Ok(repo::create(db, &comment).await?)
}

pub async fn with_authors(db: &Db<'_>, comments: Vec<Comment>) -> Result<Vec<CommentView>, BackendError> {
    let ids: Vec<Uuid> = comments.iter().map(|c| c.user_id).collect();
    let by_id = authors(db, &ids).await?;
    Ok(comments
        .into_iter()
        .map(|comment| CommentView {
            author: by_id.get(&comment.user_id).cloned(),
            comment,
        })
        .collect())
}
