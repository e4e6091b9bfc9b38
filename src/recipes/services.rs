use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::{CreateRecipeRequest, RecipeDetails, UpdateRecipeRequest};
use super::repo::{self, NewRecipe, Recipe, RecipePatch};
use crate::backend::{BackendError, Db};
use crate::profiles::repo as profiles;

pub const MAX_PAGE: usize = 100;

pub const CATEGORIES: [&str; 12] = [
    "Italian",
    "Mexican",
    "Chinese",
    "Japanese",
    "Indian",
    "French",
    "Thai",
    "Mediterranean",
    "American",
    "Korean",
    "Vietnamese",
    "Other",
];

/// `"Grandma's Apple Pie!"` → `"grandma-s-apple-pie"`.
pub fn slugify(title: &str) -> String {
    lazy_static! {
        static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
    }
    NON_ALNUM
        .replace_all(&title.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

fn clean_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

fn clean_category(category: Option<String>) -> Option<String> {
    category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn check_amounts(prep: Option<i32>, cook: Option<i32>, servings: Option<i32>) -> Result<(), String> {
    if prep.is_some_and(|m| m < 0) || cook.is_some_and(|m| m < 0) {
        return Err("Times cannot be negative".into());
    }
    if servings.is_some_and(|s| s < 1) {
        return Err("Servings must be at least 1".into());
    }
    Ok(())
}

pub fn validate_new(user_id: Uuid, req: CreateRecipeRequest) -> Result<NewRecipe, String> {
    let title = req.title.trim().to_string();
    let description = req.description.trim().to_string();
    if title.is_empty() || description.is_empty() {
        return Err("Title and description are required".into());
    }

    let ingredients = clean_lines(req.ingredients);
    let steps = clean_lines(req.steps);
    if ingredients.is_empty() || steps.is_empty() {
        return Err("At least one ingredient and one instruction are required".into());
    }
    check_amounts(req.prep_time, req.cook_time, req.servings)?;

    // empty for titles without ASCII letters or digits
    let slug = slugify(&title);

    Ok(NewRecipe {
        user_id,
        title,
        slug,
        description,
        ingredients,
        steps,
        prep_time: req.prep_time,
        cook_time: req.cook_time,
        servings: req.servings,
        category: clean_category(req.category),
        is_public: req.is_public.unwrap_or(true),
    })
}

pub fn validate_patch(req: UpdateRecipeRequest) -> Result<RecipePatch, String> {
    let mut patch = RecipePatch::default();

    if let Some(title) = req.title {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err("Title is required".into());
        }
        patch.slug = Some(slugify(&title));
        patch.title = Some(title);
    }
    if let Some(description) = req.description {
        let description = description.trim().to_string();
        if description.is_empty() {
            return Err("Description is required".into());
        }
        patch.description = Some(description);
    }
    if let Some(lines) = req.ingredients {
        let lines = clean_lines(lines);
        if lines.is_empty() {
            return Err("At least one ingredient is required".into());
        }
        patch.ingredients = Some(lines);
    }
    if let Some(lines) = req.steps {
        let lines = clean_lines(lines);
        if lines.is_empty() {
            return Err("At least one instruction is required".into());
        }
        patch.steps = Some(lines);
    }
    check_amounts(req.prep_time, req.cook_time, req.servings)?;

    patch.prep_time = req.prep_time;
    patch.cook_time = req.cook_time;
    patch.servings = req.servings;
    patch.category = clean_category(req.category);
    patch.is_public = req.is_public;
    patch.updated_at = Some(OffsetDateTime::now_utc());
    Ok(patch)
}

/// Private recipes are only visible to their owner.
pub fn visible_to(recipe: &Recipe, viewer: Option<Uuid>) -> bool {
    recipe.is_public || viewer == Some(recipe.user_id)
}

/// Newest recipe with `slug` that `viewer` may see. Slugs are not unique, so
/// a hidden newer recipe must not shadow an older visible one.
pub async fn find_visible_by_slug(
    db: &Db<'_>,
    slug: &str,
    viewer: Option<Uuid>,
) -> Result<Option<Recipe>, BackendError> {
    Ok(repo::list_by_slug(db, slug)
        .await?
        .into_iter()
        .find(|r| visible_to(r, viewer)))
}

/// Looks a recipe up and hides it unless `viewer` may see it.
pub async fn find_visible(
    db: &Db<'_>,
    id: Uuid,
    viewer: Option<Uuid>,
) -> Result<Option<Recipe>, BackendError> {
    Ok(repo::find_by_id(db, id)
        .await?
        .filter(|r| visible_to(r, viewer)))
}

pub async fn with_author(db: &Db<'_>, recipe: Recipe) -> Result<RecipeDetails, BackendError> {
    let author = profiles::find_by_id(db, recipe.user_id)
        .await?
        .as_ref()
        .map(Into::into);
    Ok(RecipeDetails { recipe, author })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::recipes::repo::{self, RecipeFilter};

    fn request(title: &str) -> CreateRecipeRequest {
        CreateRecipeRequest {
            title: title.into(),
            description: "Weeknight dinner".into(),
            ingredients: vec!["pasta".into(), "  ".into(), " garlic ".into()],
            steps: vec!["boil".into(), "".into()],
            prep_time: Some(10),
            cook_time: Some(15),
            servings: Some(2),
            category: Some("Italian".into()),
            is_public: None,
        }
    }

    #[test]
    fn slug_rules() {
        assert_eq!(slugify("Grandma's Apple Pie!"), "grandma-s-apple-pie");
        assert_eq!(slugify("  --Spicy   Tofu--  "), "spicy-tofu");
        assert_eq!(slugify("Crème Brûlée"), "cr-me-br-l-e");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn new_recipe_drops_blank_lines_and_defaults_public() {
        let owner = Uuid::new_v4();
        let r = validate_new(owner, request("Garlic Pasta")).unwrap();
        assert_eq!(r.slug, "garlic-pasta");
        assert_eq!(r.ingredients, vec!["pasta", "garlic"]);
        assert_eq!(r.steps, vec!["boil"]);
        assert!(r.is_public);
        assert_eq!(r.user_id, owner);
    }

    #[test]
    fn new_recipe_requires_title_description_and_lines() {
        let mut req = request("  ");
        assert_eq!(
            validate_new(Uuid::new_v4(), req).unwrap_err(),
            "Title and description are required"
        );

        req = request("Soup");
        req.steps = vec!["   ".into()];
        assert_eq!(
            validate_new(Uuid::new_v4(), req).unwrap_err(),
            "At least one ingredient and one instruction are required"
        );

        req = request("Soup");
        req.servings = Some(0);
        assert_eq!(
            validate_new(Uuid::new_v4(), req).unwrap_err(),
            "Servings must be at least 1"
        );
    }

    #[test]
    fn titles_without_ascii_alphanumerics_are_accepted() {
        let r = validate_new(Uuid::new_v4(), request("寿司")).unwrap();
        assert_eq!(r.title, "寿司");
        assert_eq!(r.slug, "");

        let patch = validate_patch(UpdateRecipeRequest {
            title: Some("ラーメン".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(patch.title.as_deref(), Some("ラーメン"));
        assert_eq!(patch.slug.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn slug_lookup_skips_newer_hidden_recipes() {
        let mem = MemoryBackend::new();
        let db = Db::new(&mem, None);
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let public = repo::create(&db, &validate_new(alice, request("Pho")).unwrap())
            .await
            .unwrap();
        let mut hidden = request("Pho");
        hidden.is_public = Some(false);
        let private = repo::create(&db, &validate_new(bob, hidden).unwrap())
            .await
            .unwrap();

        let anon = find_visible_by_slug(&db, "pho", None).await.unwrap().unwrap();
        assert_eq!(anon.id, public.id);
        let own = find_visible_by_slug(&db, "pho", Some(bob)).await.unwrap().unwrap();
        assert_eq!(own.id, private.id);
        assert!(find_visible_by_slug(&db, "pad-thai", None).await.unwrap().is_none());
    }

    #[test]
    fn patch_regenerates_slug_with_title() {
        let patch = validate_patch(UpdateRecipeRequest {
            title: Some("New Name".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(patch.slug.as_deref(), Some("new-name"));
        assert!(patch.description.is_none());

        let err = validate_patch(UpdateRecipeRequest {
            ingredients: Some(vec![" ".into()]),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, "At least one ingredient is required");
    }

    #[tokio::test]
    async fn private_recipes_never_reach_the_public_listing() {
        let mem = MemoryBackend::new();
        let db = Db::new(&mem, None);
        let owner = Uuid::new_v4();

        let mut hidden = request("Secret Garlic Pasta");
        hidden.is_public = Some(false);
        repo::create(&db, &validate_new(owner, hidden).unwrap()).await.unwrap();
        repo::create(&db, &validate_new(owner, request("Garlic Pasta")).unwrap())
            .await
            .unwrap();

        let filters = [
            RecipeFilter { limit: 50, ..Default::default() },
            RecipeFilter { search: Some("secret".into()), limit: 50, ..Default::default() },
            RecipeFilter { category: Some("Italian".into()), limit: 50, ..Default::default() },
            RecipeFilter {
                search: Some("garlic".into()),
                category: Some("Italian".into()),
                limit: 50,
                offset: 0,
            },
        ];
        for f in &filters {
            let listed = repo::list_public(&db, f).await.unwrap();
            assert!(listed.iter().all(|r| r.is_public), "filter {f:?}");
            assert!(listed.iter().all(|r| r.title != "Secret Garlic Pasta"));
        }
        assert!(repo::list_public(&db, &filters[1]).await.unwrap().is_empty());
        assert_eq!(repo::list_public(&db, &filters[3]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn search_matches_title_or_description_case_insensitively() {
        let mem = MemoryBackend::new();
        let db = Db::new(&mem, None);
        let owner = Uuid::new_v4();

        let mut by_desc = request("Tomato Soup");
        by_desc.description = "A GARLIC-forward classic".into();
        repo::create(&db, &validate_new(owner, by_desc).unwrap()).await.unwrap();
        repo::create(&db, &validate_new(owner, request("Pancakes")).unwrap())
            .await
            .unwrap();

        let found = repo::list_public(
            &db,
            &RecipeFilter { search: Some("garlic".into()), limit: 20, ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Tomato Soup");
    }

    #[test]
    fn visibility_rules() {
        let owner = Uuid::new_v4();
        let recipe = Recipe {
            id: Uuid::new_v4(),
            user_id: owner,
            title: "x".into(),
            slug: "x".into(),
            description: None,
            ingredients: vec![],
            steps: vec![],
            prep_time: None,
            cook_time: None,
            servings: None,
            category: None,
            is_public: false,
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        };
        assert!(visible_to(&recipe, Some(owner)));
        assert!(!visible_to(&recipe, Some(Uuid::new_v4())));
        assert!(!visible_to(&recipe, None));
    }
}
