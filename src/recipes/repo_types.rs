use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::catalog::repo_types::Tag;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub image: String,   // opaque reference, storage lives elsewhere
    pub text: String,
    pub cooking_time: i32, // minutes, >= 1
    pub pub_date: OffsetDateTime,
}

/// One IngredientRecipe row joined with its ingredient.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RecipeIngredient {
    pub ingredient_id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// An ingredient line tagged with the recipe it belongs to, for loading a
/// whole page of recipes at once.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeIngredientRow {
    pub recipe_id: Uuid,
    #[sqlx(flatten)]
    pub line: RecipeIngredient,
}

#[derive(Debug, Clone, FromRow)]
pub struct RecipeTagRow {
    pub recipe_id: Uuid,
    #[sqlx(flatten)]
    pub tag: Tag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub ingredient_id: Uuid,
    pub amount: i32,
}

/// Full, validated content of a recipe; create and update both write this
/// as a whole.
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<Uuid>,
}

/// An ingredient line pulled from a recipe in somebody's shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CartLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}
