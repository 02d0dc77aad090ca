use tracing::{info, warn};
use uuid::Uuid;

use super::dto::RecipeSummary;
use crate::{error::ApiError, state::AppState, users::services as users};

/// The two user→recipe bookmarks. Both live in tables of identical shape
/// with a unique (user_id, recipe_id) constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Favorite,
    ShoppingCart,
}

impl RelationKind {
    pub fn table(self) -> &'static str {
        match self {
            RelationKind::Favorite => "favorites",
            RelationKind::ShoppingCart => "shopping_cart",
        }
    }

    fn duplicate_message(self) -> &'static str {
        match self {
            RelationKind::Favorite => "Recipe is already in favorites",
            RelationKind::ShoppingCart => "Recipe is already in the shopping cart",
        }
    }

    fn missing_message(self) -> &'static str {
        match self {
            RelationKind::Favorite => "Recipe is not in favorites",
            RelationKind::ShoppingCart => "Recipe is not in the shopping cart",
        }
    }
}

pub async fn add(
    st: &AppState,
    kind: RelationKind,
    user_id: Uuid,
    recipe_id: Uuid,
) -> Result<RecipeSummary, ApiError> {
    let recipe = st
        .recipes
        .find(recipe_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe not found"))?;
    users::current_user(st, user_id).await?;

    // The unique constraint decides; a concurrent duplicate loses here too.
    if !st.recipes.add_relation(kind, user_id, recipe_id).await? {
        warn!(?kind, user_id = %user_id, recipe_id = %recipe_id, "duplicate relation");
        return Err(ApiError::Conflict(kind.duplicate_message().into()));
    }

    info!(?kind, user_id = %user_id, recipe_id = %recipe_id, "relation added");
    Ok(RecipeSummary::from(&recipe))
}

pub async fn remove(
    st: &AppState,
    kind: RelationKind,
    user_id: Uuid,
    recipe_id: Uuid,
) -> Result<(), ApiError> {
    if st.recipes.find(recipe_id).await?.is_none() {
        return Err(ApiError::not_found("Recipe not found"));
    }
    users::current_user(st, user_id).await?;
    if !st.recipes.remove_relation(kind, user_id, recipe_id).await? {
        return Err(ApiError::not_found(kind.missing_message()));
    }
    info!(?kind, user_id = %user_id, recipe_id = %recipe_id, "relation removed");
    Ok(())
}
