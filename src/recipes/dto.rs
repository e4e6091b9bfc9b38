use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::Recipe;
use crate::profiles::dto::AuthorSummary;

#[derive(Debug, Deserialize)]
pub struct ListRecipesParams {
    #[serde(default, alias = "q")]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}
fn default_limit() -> usize { 20 }

#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default, alias = "instructions")]
    pub steps: Vec<String>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub servings: Option<i32>,
    #[serde(alias = "cuisine")]
    pub category: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRecipeRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<String>>,
    #[serde(alias = "instructions")]
    pub steps: Option<Vec<String>>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub servings: Option<i32>,
    #[serde(alias = "cuisine")]
    pub category: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RecipeDetails {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub author: Option<AuthorSummary>,
}

/// Card-sized view embedded in bookmark listings.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub servings: Option<i32>,
    pub category: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&Recipe> for RecipeSummary {
    fn from(r: &Recipe) -> Self {
        Self {
            id: r.id,
            title: r.title.clone(),
            slug: r.slug.clone(),
            description: r.description.clone(),
            prep_time: r.prep_time,
            cook_time: r.cook_time,
            servings: r.servings,
            category: r.category.clone(),
            created_at: r.created_at,
        }
    }
}
