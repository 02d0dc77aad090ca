use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{
    filter::RecipeFilter,
    relations::RelationKind,
    repo_types::{CartLine, NewRecipe, Recipe, RecipeIngredient, RecipeIngredientRow, RecipeTagRow},
};
use crate::catalog::repo_types::Tag;

#[async_trait]
pub trait RecipeRepo: Send + Sync {
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Recipe>>;
    /// Recipes matching `filter`, newest first.
    async fn list(&self, filter: &RecipeFilter) -> anyhow::Result<Vec<Recipe>>;
    /// An author's recipes, newest first.
    async fn list_by_author(&self, author_id: Uuid, limit: Option<i64>) -> anyhow::Result<Vec<Recipe>>;
    async fn count_by_author(&self, author_id: Uuid) -> anyhow::Result<i64>;
    async fn ingredients_of(&self, recipe_id: Uuid) -> anyhow::Result<Vec<RecipeIngredient>>;
    async fn tags_of(&self, recipe_id: Uuid) -> anyhow::Result<Vec<Tag>>;
    /// Ingredient lines of all `recipe_ids`, in row order.
    async fn ingredients_for(&self, recipe_ids: &[Uuid]) -> anyhow::Result<Vec<RecipeIngredientRow>>;
    /// Tags of all `recipe_ids`, ordered by tag name.
    async fn tags_for(&self, recipe_ids: &[Uuid]) -> anyhow::Result<Vec<RecipeTagRow>>;

    /// Writes the recipe with all of its ingredient and tag rows atomically.
    async fn create(&self, author_id: Uuid, new: &NewRecipe) -> anyhow::Result<Recipe>;
    /// Replaces content, ingredient rows and tags atomically. `None` if the
    /// recipe does not exist.
    async fn update(&self, id: Uuid, new: &NewRecipe) -> anyhow::Result<Option<Recipe>>;
    /// Deletes the recipe and, by cascade, everything that points at it.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;

    /// The subset of `recipe_ids` that `user_id` has a `kind` relation to.
    async fn related_ids(&self, kind: RelationKind, user_id: Uuid, recipe_ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>>;
    /// Returns `false` when the relation already existed.
    async fn add_relation(&self, kind: RelationKind, user_id: Uuid, recipe_id: Uuid) -> anyhow::Result<bool>;
    /// Returns `false` when there was nothing to delete.
    async fn remove_relation(&self, kind: RelationKind, user_id: Uuid, recipe_id: Uuid) -> anyhow::Result<bool>;

    /// Ingredient lines of every recipe in the user's cart, in row order.
    async fn cart_lines(&self, user_id: Uuid) -> anyhow::Result<Vec<CartLine>>;
}

pub struct PgRecipeRepo {
    db: PgPool,
}

impl PgRecipeRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const RECIPE_COLUMNS: &str = "r.id, r.author_id, r.name, r.image, r.text, r.cooking_time, r.pub_date";

async fn insert_components_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    new: &NewRecipe,
) -> anyhow::Result<()> {
    for item in &new.ingredients {
        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(recipe_id)
        .bind(item.ingredient_id)
        .bind(item.amount)
        .execute(&mut **tx)
        .await
        .context("insert recipe ingredient")?;
    }
    for tag_id in &new.tags {
        sqlx::query(r#"INSERT INTO recipe_tags (recipe_id, tag_id) VALUES ($1, $2)"#)
            .bind(recipe_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await
            .context("insert recipe tag")?;
    }
    Ok(())
}

#[async_trait]
impl RecipeRepo for PgRecipeRepo {
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find recipe")?;
        Ok(recipe)
    }

    async fn list(&self, filter: &RecipeFilter) -> anyhow::Result<Vec<Recipe>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {RECIPE_COLUMNS} FROM recipes r"));
        filter.push_sql(&mut qb);
        qb.push(" ORDER BY r.pub_date DESC");
        let rows = qb
            .build_query_as::<Recipe>()
            .fetch_all(&self.db)
            .await
            .context("list recipes")?;
        Ok(rows)
    }

    async fn list_by_author(&self, author_id: Uuid, limit: Option<i64>) -> anyhow::Result<Vec<Recipe>> {
        // LIMIT NULL means no limit in Postgres.
        let rows = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            SELECT {RECIPE_COLUMNS}
            FROM recipes r
            WHERE r.author_id = $1
            ORDER BY r.pub_date DESC
            LIMIT $2
            "#
        ))
        .bind(author_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("list recipes by author")?;
        Ok(rows)
    }

    async fn count_by_author(&self, author_id: Uuid) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM recipes WHERE author_id = $1"#)
            .bind(author_id)
            .fetch_one(&self.db)
            .await
            .context("count recipes by author")?;
        Ok(count)
    }

    async fn ingredients_of(&self, recipe_id: Uuid) -> anyhow::Result<Vec<RecipeIngredient>> {
        let rows = sqlx::query_as::<_, RecipeIngredient>(
            r#"
            SELECT i.id AS ingredient_id, i.name, i.measurement_unit, ri.amount
            FROM recipe_ingredients ri
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = $1
            ORDER BY ri.id
            "#,
        )
        .bind(recipe_id)
        .fetch_all(&self.db)
        .await
        .context("list recipe ingredients")?;
        Ok(rows)
    }

    async fn tags_of(&self, recipe_id: Uuid) -> anyhow::Result<Vec<Tag>> {
        let rows = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.name, t.color, t.slug
            FROM tags t
            JOIN recipe_tags rt ON rt.tag_id = t.id
            WHERE rt.recipe_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(recipe_id)
        .fetch_all(&self.db)
        .await
        .context("list recipe tags")?;
        Ok(rows)
    }

    async fn ingredients_for(&self, recipe_ids: &[Uuid]) -> anyhow::Result<Vec<RecipeIngredientRow>> {
        let rows = sqlx::query_as::<_, RecipeIngredientRow>(
            r#"
            SELECT ri.recipe_id, i.id AS ingredient_id, i.name, i.measurement_unit, ri.amount
            FROM recipe_ingredients ri
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = ANY($1)
            ORDER BY ri.id
            "#,
        )
        .bind(recipe_ids)
        .fetch_all(&self.db)
        .await
        .context("list ingredients of recipes")?;
        Ok(rows)
    }

    async fn tags_for(&self, recipe_ids: &[Uuid]) -> anyhow::Result<Vec<RecipeTagRow>> {
        let rows = sqlx::query_as::<_, RecipeTagRow>(
            r#"
            SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
            FROM tags t
            JOIN recipe_tags rt ON rt.tag_id = t.id
            WHERE rt.recipe_id = ANY($1)
            ORDER BY t.name
            "#,
        )
        .bind(recipe_ids)
        .fetch_all(&self.db)
        .await
        .context("list tags of recipes")?;
        Ok(rows)
    }

    async fn create(&self, author_id: Uuid, new: &NewRecipe) -> anyhow::Result<Recipe> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            INSERT INTO recipes (id, author_id, name, image, text, cooking_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, author_id, name, image, text, cooking_time, pub_date
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(author_id)
        .bind(&new.name)
        .bind(&new.image)
        .bind(&new.text)
        .bind(new.cooking_time)
        .fetch_one(&mut *tx)
        .await
        .context("insert recipe")?;

        insert_components_tx(&mut tx, recipe.id, new).await?;
        tx.commit().await.context("commit tx")?;
        Ok(recipe)
    }

    async fn update(&self, id: Uuid, new: &NewRecipe) -> anyhow::Result<Option<Recipe>> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            UPDATE recipes
            SET name = $2, image = $3, text = $4, cooking_time = $5
            WHERE id = $1
            RETURNING id, author_id, name, image, text, cooking_time, pub_date
            "#,
        )
        .bind(id)
        .bind(&new.name)
        .bind(&new.image)
        .bind(&new.text)
        .bind(new.cooking_time)
        .fetch_optional(&mut *tx)
        .await
        .context("update recipe")?;

        // Dropping the transaction rolls it back.
        let Some(recipe) = recipe else {
            return Ok(None);
        };

        sqlx::query(r#"DELETE FROM recipe_ingredients WHERE recipe_id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("clear recipe ingredients")?;
        sqlx::query(r#"DELETE FROM recipe_tags WHERE recipe_id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("clear recipe tags")?;

        insert_components_tx(&mut tx, id, new).await?;
        tx.commit().await.context("commit tx")?;
        Ok(Some(recipe))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"DELETE FROM recipes WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete recipe")?;
        Ok(res.rows_affected() > 0)
    }

    async fn related_ids(&self, kind: RelationKind, user_id: Uuid, recipe_ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(&format!(
            "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = ANY($2)",
            kind.table()
        ))
        .bind(user_id)
        .bind(recipe_ids)
        .fetch_all(&self.db)
        .await
        .with_context(|| format!("list {} ids", kind.table()))?;
        Ok(ids)
    }

    async fn add_relation(&self, kind: RelationKind, user_id: Uuid, recipe_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(&format!(
            "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, recipe_id) DO NOTHING",
            kind.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(&self.db)
        .await
        .with_context(|| format!("insert into {}", kind.table()))?;
        Ok(res.rows_affected() == 1)
    }

    async fn remove_relation(&self, kind: RelationKind, user_id: Uuid, recipe_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
            kind.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(&self.db)
        .await
        .with_context(|| format!("delete from {}", kind.table()))?;
        Ok(res.rows_affected() > 0)
    }

    async fn cart_lines(&self, user_id: Uuid) -> anyhow::Result<Vec<CartLine>> {
        let rows = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT i.name, i.measurement_unit, ri.amount
            FROM recipe_ingredients ri
            JOIN ingredients i ON i.id = ri.ingredient_id
            JOIN shopping_cart c ON c.recipe_id = ri.recipe_id
            WHERE c.user_id = $1
            ORDER BY ri.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("load shopping cart lines")?;
        Ok(rows)
    }
}
