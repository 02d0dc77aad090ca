//! In-memory repositories backing the unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    catalog::{
        repo::CatalogRepo,
        repo_types::{Ingredient, Tag},
    },
    recipes::{
        filter::{Candidate, RecipeFilter},
        relations::RelationKind,
        repo::RecipeRepo,
        repo_types::{
            CartLine, IngredientAmount, NewRecipe, Recipe, RecipeIngredient, RecipeIngredientRow,
            RecipeTagRow,
        },
    },
    users::{
        repo::UserRepo,
        repo_types::{NewUser, User},
    },
};

#[derive(Default)]
struct Inner {
    seq: i64,
    users: Vec<User>,
    follows: Vec<(Uuid, Uuid)>,
    ingredients: Vec<Ingredient>,
    tags: Vec<Tag>,
    recipes: Vec<Recipe>,
    // (recipe_id, line) in insertion order, like a serial primary key
    recipe_ingredients: Vec<(Uuid, IngredientAmount)>,
    recipe_tags: Vec<(Uuid, Uuid)>,
    favorites: Vec<(Uuid, Uuid)>,
    shopping_cart: Vec<(Uuid, Uuid)>,
}

impl Inner {
    fn tick(&mut self) -> OffsetDateTime {
        self.seq += 1;
        OffsetDateTime::UNIX_EPOCH + Duration::minutes(self.seq)
    }

    fn relations(&self, kind: RelationKind) -> &Vec<(Uuid, Uuid)> {
        match kind {
            RelationKind::Favorite => &self.favorites,
            RelationKind::ShoppingCart => &self.shopping_cart,
        }
    }

    fn relations_mut(&mut self, kind: RelationKind) -> &mut Vec<(Uuid, Uuid)> {
        match kind {
            RelationKind::Favorite => &mut self.favorites,
            RelationKind::ShoppingCart => &mut self.shopping_cart,
        }
    }

    fn insert_user(&mut self, new: &NewUser<'_>, is_admin: bool) -> Option<User> {
        if self
            .users
            .iter()
            .any(|u| u.email == new.email || u.username == new.username)
        {
            return None;
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email.to_string(),
            username: new.username.to_string(),
            first_name: new.first_name.to_string(),
            last_name: new.last_name.to_string(),
            password_hash: new.password_hash.to_string(),
            is_admin,
            created_at: self.tick(),
        };
        self.users.push(user.clone());
        Some(user)
    }

    fn write_components(&mut self, recipe_id: Uuid, new: &NewRecipe) {
        self.recipe_ingredients.retain(|(r, _)| *r != recipe_id);
        self.recipe_tags.retain(|(r, _)| *r != recipe_id);
        for item in &new.ingredients {
            self.recipe_ingredients.push((recipe_id, *item));
        }
        for tag in &new.tags {
            self.recipe_tags.push((recipe_id, *tag));
        }
    }

    fn insert_recipe(&mut self, author_id: Uuid, new: &NewRecipe) -> Recipe {
        let recipe = Recipe {
            id: Uuid::new_v4(),
            author_id,
            name: new.name.clone(),
            image: new.image.clone(),
            text: new.text.clone(),
            cooking_time: new.cooking_time,
            pub_date: self.tick(),
        };
        self.recipes.push(recipe.clone());
        self.write_components(recipe.id, new);
        recipe
    }

    fn users_sorted(&self, mut users: Vec<User>) -> Vec<User> {
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }
}

/// One store implementing every repository trait, shared through
/// [`crate::state::AppState::with_store`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

pub fn sample_recipe(name: &str, ingredients: &[(Uuid, i32)], tags: &[Uuid]) -> NewRecipe {
    NewRecipe {
        name: name.to_string(),
        image: "recipes/x.png".to_string(),
        text: format!("How to cook {name}."),
        cooking_time: 10,
        ingredients: ingredients
            .iter()
            .map(|&(ingredient_id, amount)| IngredientAmount { ingredient_id, amount })
            .collect(),
        tags: tags.to_vec(),
    }
}

impl MemoryStore {
    fn add_account(&self, username: &str, is_admin: bool) -> User {
        let email = format!("{username}@example.com");
        let new = NewUser {
            email: &email,
            username,
            first_name: "Test",
            last_name: "User",
            password_hash: "not-a-real-hash",
        };
        self.inner
            .lock()
            .unwrap()
            .insert_user(&new, is_admin)
            .expect("unique test user")
    }

    pub fn add_user(&self, username: &str) -> User {
        self.add_account(username, false)
    }

    pub fn add_admin(&self, username: &str) -> User {
        self.add_account(username, true)
    }

    pub fn add_ingredient(&self, name: &str, unit: &str) -> Ingredient {
        let ingredient = Ingredient {
            id: Uuid::new_v4(),
            name: name.to_string(),
            measurement_unit: unit.to_string(),
        };
        self.inner.lock().unwrap().ingredients.push(ingredient.clone());
        ingredient
    }

    pub fn add_tag(&self, name: &str, slug: &str) -> Tag {
        let tag = Tag {
            id: Uuid::new_v4(),
            name: name.to_string(),
            color: Some("#E26C2D".to_string()),
            slug: slug.to_string(),
        };
        self.inner.lock().unwrap().tags.push(tag.clone());
        tag
    }

    pub fn insert_recipe(&self, author_id: Uuid, new: &NewRecipe) -> Recipe {
        self.inner.lock().unwrap().insert_recipe(author_id, new)
    }

    pub fn follow_count(&self, user_id: Uuid, author_id: Uuid) -> usize {
        self.inner
            .lock()
            .unwrap()
            .follows
            .iter()
            .filter(|&&f| f == (user_id, author_id))
            .count()
    }

    pub fn relation_count(&self, kind: RelationKind, user_id: Uuid, recipe_id: Uuid) -> usize {
        self.inner
            .lock()
            .unwrap()
            .relations(kind)
            .iter()
            .filter(|&&r| r == (user_id, recipe_id))
            .count()
    }

    pub fn recipe_count(&self) -> usize {
        self.inner.lock().unwrap().recipes.len()
    }

    pub fn ingredient_row_count(&self, recipe_id: Uuid) -> usize {
        self.inner
            .lock()
            .unwrap()
            .recipe_ingredients
            .iter()
            .filter(|(r, _)| *r == recipe_id)
            .count()
    }

    pub fn tag_row_count(&self, recipe_id: Uuid) -> usize {
        self.inner
            .lock()
            .unwrap()
            .recipe_tags
            .iter()
            .filter(|(r, _)| *r == recipe_id)
            .count()
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().filter(|u| ids.contains(&u.id)).cloned().collect())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.username == username).cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users_sorted(inner.users.clone()))
    }

    async fn create(&self, new: &NewUser<'_>) -> anyhow::Result<Option<User>> {
        Ok(self.inner.lock().unwrap().insert_user(new, false))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.follows.contains(&(user_id, author_id)))
    }

    async fn insert_follow(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        if inner.follows.contains(&(user_id, author_id)) {
            return Ok(false);
        }
        inner.follows.push((user_id, author_id));
        Ok(true)
    }

    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.follows.len();
        inner.follows.retain(|&f| f != (user_id, author_id));
        Ok(inner.follows.len() != before)
    }

    async fn list_following(&self, user_id: Uuid) -> anyhow::Result<Vec<User>> {
        let inner = self.inner.lock().unwrap();
        let authors = inner
            .users
            .iter()
            .filter(|u| inner.follows.contains(&(user_id, u.id)))
            .cloned()
            .collect();
        Ok(inner.users_sorted(authors))
    }

    async fn following_ids(&self, user_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .follows
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, a)| *a)
            .collect())
    }
}

#[async_trait]
impl CatalogRepo for MemoryStore {
    async fn search_ingredients(&self, name_prefix: Option<&str>) -> anyhow::Result<Vec<Ingredient>> {
        let inner = self.inner.lock().unwrap();
        let prefix = name_prefix.map(str::to_lowercase);
        let mut found: Vec<Ingredient> = inner
            .ingredients
            .iter()
            .filter(|i| match &prefix {
                Some(p) => i.name.to_lowercase().starts_with(p.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        found.sort_by_key(|i| i.name.to_lowercase());
        Ok(found)
    }

    async fn find_ingredient(&self, id: Uuid) -> anyhow::Result<Option<Ingredient>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.ingredients.iter().find(|i| i.id == id).cloned())
    }

    async fn find_ingredients(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Ingredient>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .ingredients
            .iter()
            .filter(|i| ids.contains(&i.id))
            .cloned()
            .collect())
    }

    async fn list_tags(&self) -> anyhow::Result<Vec<Tag>> {
        let inner = self.inner.lock().unwrap();
        let mut tags = inner.tags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn find_tag(&self, id: Uuid) -> anyhow::Result<Option<Tag>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.tags.iter().find(|t| t.id == id).cloned())
    }

    async fn find_tags(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Tag>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.tags.iter().filter(|t| ids.contains(&t.id)).cloned().collect())
    }
}

fn newest_first(mut recipes: Vec<Recipe>) -> Vec<Recipe> {
    recipes.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
    recipes
}

#[async_trait]
impl RecipeRepo for MemoryStore {
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.recipes.iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self, filter: &RecipeFilter) -> anyhow::Result<Vec<Recipe>> {
        let inner = self.inner.lock().unwrap();
        let users_of = |rows: &Vec<(Uuid, Uuid)>, recipe_id: Uuid| -> Vec<Uuid> {
            rows.iter()
                .filter(|(_, r)| *r == recipe_id)
                .map(|(u, _)| *u)
                .collect()
        };
        let matching = inner
            .recipes
            .iter()
            .filter(|r| {
                let tag_slugs: Vec<String> = inner
                    .recipe_tags
                    .iter()
                    .filter(|(rid, _)| *rid == r.id)
                    .filter_map(|(_, tid)| inner.tags.iter().find(|t| t.id == *tid))
                    .map(|t| t.slug.clone())
                    .collect();
                let favorited_by = users_of(&inner.favorites, r.id);
                let in_cart_of = users_of(&inner.shopping_cart, r.id);
                filter.matches(&Candidate {
                    author_id: r.author_id,
                    tag_slugs: &tag_slugs,
                    favorited_by: &favorited_by,
                    in_cart_of: &in_cart_of,
                })
            })
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }

    async fn list_by_author(&self, author_id: Uuid, limit: Option<i64>) -> anyhow::Result<Vec<Recipe>> {
        let inner = self.inner.lock().unwrap();
        let mine = newest_first(
            inner
                .recipes
                .iter()
                .filter(|r| r.author_id == author_id)
                .cloned()
                .collect(),
        );
        Ok(match limit {
            Some(n) => mine.into_iter().take(n.max(0) as usize).collect(),
            None => mine,
        })
    }

    async fn count_by_author(&self, author_id: Uuid) -> anyhow::Result<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.recipes.iter().filter(|r| r.author_id == author_id).count() as i64)
    }

    async fn ingredients_of(&self, recipe_id: Uuid) -> anyhow::Result<Vec<RecipeIngredient>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .recipe_ingredients
            .iter()
            .filter(|(r, _)| *r == recipe_id)
            .filter_map(|(_, line)| {
                inner
                    .ingredients
                    .iter()
                    .find(|i| i.id == line.ingredient_id)
                    .map(|i| RecipeIngredient {
                        ingredient_id: i.id,
                        name: i.name.clone(),
                        measurement_unit: i.measurement_unit.clone(),
                        amount: line.amount,
                    })
            })
            .collect())
    }

    async fn tags_of(&self, recipe_id: Uuid) -> anyhow::Result<Vec<Tag>> {
        let inner = self.inner.lock().unwrap();
        let mut tags: Vec<Tag> = inner
            .recipe_tags
            .iter()
            .filter(|(r, _)| *r == recipe_id)
            .filter_map(|(_, tid)| inner.tags.iter().find(|t| t.id == *tid).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn ingredients_for(&self, recipe_ids: &[Uuid]) -> anyhow::Result<Vec<RecipeIngredientRow>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .recipe_ingredients
            .iter()
            .filter(|(r, _)| recipe_ids.contains(r))
            .filter_map(|(r, line)| {
                inner
                    .ingredients
                    .iter()
                    .find(|i| i.id == line.ingredient_id)
                    .map(|i| RecipeIngredientRow {
                        recipe_id: *r,
                        line: RecipeIngredient {
                            ingredient_id: i.id,
                            name: i.name.clone(),
                            measurement_unit: i.measurement_unit.clone(),
                            amount: line.amount,
                        },
                    })
            })
            .collect())
    }

    async fn tags_for(&self, recipe_ids: &[Uuid]) -> anyhow::Result<Vec<RecipeTagRow>> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<RecipeTagRow> = inner
            .recipe_tags
            .iter()
            .filter(|(r, _)| recipe_ids.contains(r))
            .filter_map(|(r, tid)| {
                inner.tags.iter().find(|t| t.id == *tid).map(|t| RecipeTagRow {
                    recipe_id: *r,
                    tag: t.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| a.tag.name.cmp(&b.tag.name));
        Ok(rows)
    }

    async fn create(&self, author_id: Uuid, new: &NewRecipe) -> anyhow::Result<Recipe> {
        Ok(self.inner.lock().unwrap().insert_recipe(author_id, new))
    }

    async fn update(&self, id: Uuid, new: &NewRecipe) -> anyhow::Result<Option<Recipe>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(recipe) = inner.recipes.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        recipe.name = new.name.clone();
        recipe.image = new.image.clone();
        recipe.text = new.text.clone();
        recipe.cooking_time = new.cooking_time;
        let updated = recipe.clone();
        inner.write_components(id, new);
        Ok(Some(updated))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.recipes.len();
        inner.recipes.retain(|r| r.id != id);
        if inner.recipes.len() == before {
            return Ok(false);
        }
        inner.recipe_ingredients.retain(|(r, _)| *r != id);
        inner.recipe_tags.retain(|(r, _)| *r != id);
        inner.favorites.retain(|(_, r)| *r != id);
        inner.shopping_cart.retain(|(_, r)| *r != id);
        Ok(true)
    }

    async fn related_ids(&self, kind: RelationKind, user_id: Uuid, recipe_ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .relations(kind)
            .iter()
            .filter(|(u, r)| *u == user_id && recipe_ids.contains(r))
            .map(|(_, r)| *r)
            .collect())
    }

    async fn add_relation(&self, kind: RelationKind, user_id: Uuid, recipe_id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let rows = inner.relations_mut(kind);
        if rows.contains(&(user_id, recipe_id)) {
            return Ok(false);
        }
        rows.push((user_id, recipe_id));
        Ok(true)
    }

    async fn remove_relation(&self, kind: RelationKind, user_id: Uuid, recipe_id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let rows = inner.relations_mut(kind);
        let before = rows.len();
        rows.retain(|&r| r != (user_id, recipe_id));
        Ok(rows.len() != before)
    }

    async fn cart_lines(&self, user_id: Uuid) -> anyhow::Result<Vec<CartLine>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .recipe_ingredients
            .iter()
            .filter(|(r, _)| inner.shopping_cart.contains(&(user_id, *r)))
            .filter_map(|(_, line)| {
                inner
                    .ingredients
                    .iter()
                    .find(|i| i.id == line.ingredient_id)
                    .map(|i| CartLine {
                        name: i.name.clone(),
                        measurement_unit: i.measurement_unit.clone(),
                        amount: line.amount,
                    })
            })
            .collect())
    }
}
