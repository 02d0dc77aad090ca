use std::collections::{HashMap, HashSet};

use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{CreateRecipeRequest, IngredientAmountRequest, RecipeIngredientResponse, RecipeResponse, UpdateRecipeRequest},
    filter::{RecipeFilter, RecipeQuery},
    relations::RelationKind,
    repo_types::{IngredientAmount, NewRecipe, Recipe},
};
use crate::{
    catalog::repo_types::Tag,
    error::ApiError,
    state::AppState,
    users::{dto::UserProfile, repo_types::User, services as users},
};

pub const NAME_MAX_LEN: usize = 200;

fn ingredient_amounts(items: Vec<IngredientAmountRequest>) -> Vec<IngredientAmount> {
    items
        .into_iter()
        .map(|i| IngredientAmount {
            ingredient_id: i.id,
            amount: i.amount,
        })
        .collect()
}

/// Field-level checks that need no database access.
pub fn validate(new: &NewRecipe) -> Result<(), ApiError> {
    let name_len = new.name.trim().chars().count();
    if name_len == 0 || name_len > NAME_MAX_LEN {
        return Err(ApiError::invalid(format!(
            "name must be between 1 and {NAME_MAX_LEN} characters"
        )));
    }
    if new.text.trim().is_empty() {
        return Err(ApiError::invalid("text is required"));
    }
    if new.image.trim().is_empty() {
        return Err(ApiError::invalid("image is required"));
    }
    if new.cooking_time < 1 {
        return Err(ApiError::invalid("Cooking time cannot be less than 1 minute"));
    }

    if new.ingredients.is_empty() {
        return Err(ApiError::invalid("At least one ingredient is required"));
    }
    let mut seen = HashSet::new();
    for item in &new.ingredients {
        if !seen.insert(item.ingredient_id) {
            return Err(ApiError::invalid("Ingredients must not repeat"));
        }
        if item.amount < 1 {
            return Err(ApiError::invalid("Amount cannot be less than 1"));
        }
    }

    if new.tags.is_empty() {
        return Err(ApiError::invalid("At least one tag is required"));
    }
    let unique_tags: HashSet<_> = new.tags.iter().collect();
    if unique_tags.len() != new.tags.len() {
        return Err(ApiError::invalid("Tags must not repeat"));
    }
    Ok(())
}

/// Validation plus existence of every referenced ingredient and tag.
async fn check(st: &AppState, new: &NewRecipe) -> Result<(), ApiError> {
    validate(new)?;

    let ids: Vec<Uuid> = new.ingredients.iter().map(|i| i.ingredient_id).collect();
    if st.catalog.find_ingredients(&ids).await?.len() != ids.len() {
        return Err(ApiError::invalid("Unknown ingredient"));
    }
    if st.catalog.find_tags(&new.tags).await?.len() != new.tags.len() {
        return Err(ApiError::invalid("Unknown tag"));
    }
    Ok(())
}

fn ensure_can_modify(actor: &User, recipe: &Recipe) -> Result<(), ApiError> {
    if recipe.author_id == actor.id || actor.is_admin {
        return Ok(());
    }
    warn!(user_id = %actor.id, recipe_id = %recipe.id, "recipe modification denied");
    Err(ApiError::Forbidden(
        "Only the author or an administrator can change this recipe".into(),
    ))
}

async fn load(st: &AppState, id: Uuid) -> Result<Recipe, ApiError> {
    st.recipes
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe not found"))
}

/// Full representations of `recipes`, in order, as seen by `viewer`. The
/// number of queries does not depend on how many recipes there are.
async fn assemble(
    st: &AppState,
    recipes: Vec<Recipe>,
    viewer: Option<Uuid>,
) -> Result<Vec<RecipeResponse>, ApiError> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = recipes.iter().map(|r| r.id).collect();
    let mut author_ids: Vec<Uuid> = recipes.iter().map(|r| r.author_id).collect();
    author_ids.sort();
    author_ids.dedup();

    let authors: HashMap<Uuid, User> = st
        .users
        .find_by_ids(&author_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let mut ingredients: HashMap<Uuid, Vec<RecipeIngredientResponse>> = HashMap::new();
    for row in st.recipes.ingredients_for(&ids).await? {
        ingredients.entry(row.recipe_id).or_default().push(row.line.into());
    }
    let mut tags: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for row in st.recipes.tags_for(&ids).await? {
        tags.entry(row.recipe_id).or_default().push(row.tag);
    }

    let (following, favorited, in_cart): (HashSet<Uuid>, HashSet<Uuid>, HashSet<Uuid>) = match viewer {
        Some(user_id) => (
            st.users.following_ids(user_id).await?.into_iter().collect(),
            st.recipes
                .related_ids(RelationKind::Favorite, user_id, &ids)
                .await?
                .into_iter()
                .collect(),
            st.recipes
                .related_ids(RelationKind::ShoppingCart, user_id, &ids)
                .await?
                .into_iter()
                .collect(),
        ),
        None => Default::default(),
    };

    recipes
        .into_iter()
        .map(|recipe| -> Result<RecipeResponse, ApiError> {
            let author = authors
                .get(&recipe.author_id)
                .cloned()
                .ok_or_else(|| ApiError::not_found("User not found"))?;
            let is_subscribed = following.contains(&author.id);
            Ok(RecipeResponse {
                id: recipe.id,
                tags: tags.remove(&recipe.id).unwrap_or_default(),
                author: UserProfile::new(author, is_subscribed),
                ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
                is_favorited: favorited.contains(&recipe.id),
                is_in_shopping_cart: in_cart.contains(&recipe.id),
                name: recipe.name,
                image: recipe.image,
                text: recipe.text,
                cooking_time: recipe.cooking_time,
                pub_date: recipe.pub_date,
            })
        })
        .collect()
}

/// Assembles the full representation of `recipe` as seen by `viewer`.
pub async fn details(
    st: &AppState,
    recipe: Recipe,
    viewer: Option<Uuid>,
) -> Result<RecipeResponse, ApiError> {
    assemble(st, vec![recipe], viewer)
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Recipe not found"))
}

pub async fn list(
    st: &AppState,
    query: RecipeQuery,
    viewer: Option<Uuid>,
) -> Result<Vec<RecipeResponse>, ApiError> {
    let filter = RecipeFilter::new(query, viewer);
    let recipes = st.recipes.list(&filter).await?;
    assemble(st, recipes, viewer).await
}

pub async fn get(st: &AppState, id: Uuid, viewer: Option<Uuid>) -> Result<RecipeResponse, ApiError> {
    let recipe = load(st, id).await?;
    details(st, recipe, viewer).await
}

pub async fn create(
    st: &AppState,
    author_id: Uuid,
    req: CreateRecipeRequest,
) -> Result<RecipeResponse, ApiError> {
    let author = users::current_user(st, author_id).await?;
    let new = NewRecipe {
        name: req.name.trim().to_string(),
        image: req.image,
        text: req.text,
        cooking_time: req.cooking_time,
        ingredients: ingredient_amounts(req.ingredients),
        tags: req.tags,
    };
    check(st, &new).await?;

    let recipe = st.recipes.create(author.id, &new).await?;
    info!(user_id = %author.id, recipe_id = %recipe.id, "recipe created");
    details(st, recipe, Some(author.id)).await
}

pub async fn update(
    st: &AppState,
    actor_id: Uuid,
    id: Uuid,
    req: UpdateRecipeRequest,
) -> Result<RecipeResponse, ApiError> {
    let actor = users::current_user(st, actor_id).await?;
    let existing = load(st, id).await?;
    ensure_can_modify(&actor, &existing)?;

    let ingredients = match req.ingredients {
        Some(items) => ingredient_amounts(items),
        None => st
            .recipes
            .ingredients_of(id)
            .await?
            .into_iter()
            .map(|i| IngredientAmount {
                ingredient_id: i.ingredient_id,
                amount: i.amount,
            })
            .collect(),
    };
    let tags = match req.tags {
        Some(tags) => tags,
        None => st.recipes.tags_of(id).await?.into_iter().map(|t| t.id).collect(),
    };
    let merged = NewRecipe {
        name: req.name.map(|n| n.trim().to_string()).unwrap_or(existing.name),
        image: req.image.unwrap_or(existing.image),
        text: req.text.unwrap_or(existing.text),
        cooking_time: req.cooking_time.unwrap_or(existing.cooking_time),
        ingredients,
        tags,
    };
    check(st, &merged).await?;

    let recipe = st
        .recipes
        .update(id, &merged)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe not found"))?;
    info!(user_id = %actor.id, recipe_id = %id, "recipe updated");
    details(st, recipe, Some(actor.id)).await
}

pub async fn delete(st: &AppState, actor_id: Uuid, id: Uuid) -> Result<(), ApiError> {
    let actor = users::current_user(st, actor_id).await?;
    let existing = load(st, id).await?;
    ensure_can_modify(&actor, &existing)?;

    if !st.recipes.delete(id).await? {
        return Err(ApiError::not_found("Recipe not found"));
    }
    info!(user_id = %actor.id, recipe_id = %id, "recipe deleted");
    Ok(())
}
