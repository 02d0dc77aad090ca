use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Ingredient, Tag};

/// Read access to the ingredient and tag reference data.
#[async_trait]
pub trait CatalogRepo: Send + Sync {
    /// Ingredients ordered by name, optionally restricted to a
    /// case-insensitive name prefix.
    async fn search_ingredients(&self, name_prefix: Option<&str>) -> anyhow::Result<Vec<Ingredient>>;
    async fn find_ingredient(&self, id: Uuid) -> anyhow::Result<Option<Ingredient>>;
    async fn find_ingredients(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Ingredient>>;
    async fn list_tags(&self) -> anyhow::Result<Vec<Tag>>;
    async fn find_tag(&self, id: Uuid) -> anyhow::Result<Option<Tag>>;
    async fn find_tags(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Tag>>;
}

pub struct PgCatalogRepo {
    db: PgPool,
}

impl PgCatalogRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Escapes LIKE wildcards so user input only ever matches literally.
pub(crate) fn like_prefix(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[async_trait]
impl CatalogRepo for PgCatalogRepo {
    async fn search_ingredients(&self, name_prefix: Option<&str>) -> anyhow::Result<Vec<Ingredient>> {
        let rows = match name_prefix {
            Some(prefix) => sqlx::query_as::<_, Ingredient>(
                r#"
                SELECT id, name, measurement_unit
                FROM ingredients
                WHERE name ILIKE $1
                ORDER BY name
                "#,
            )
            .bind(like_prefix(prefix))
            .fetch_all(&self.db)
            .await,
            None => sqlx::query_as::<_, Ingredient>(
                r#"
                SELECT id, name, measurement_unit
                FROM ingredients
                ORDER BY name
                "#,
            )
            .fetch_all(&self.db)
            .await,
        }
        .context("search ingredients")?;
        Ok(rows)
    }

    async fn find_ingredient(&self, id: Uuid) -> anyhow::Result<Option<Ingredient>> {
        let row = sqlx::query_as::<_, Ingredient>(
            r#"SELECT id, name, measurement_unit FROM ingredients WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find ingredient")?;
        Ok(row)
    }

    async fn find_ingredients(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Ingredient>> {
        let rows = sqlx::query_as::<_, Ingredient>(
            r#"SELECT id, name, measurement_unit FROM ingredients WHERE id = ANY($1)"#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await
        .context("find ingredients")?;
        Ok(rows)
    }

    async fn list_tags(&self) -> anyhow::Result<Vec<Tag>> {
        let rows = sqlx::query_as::<_, Tag>(
            r#"SELECT id, name, color, slug FROM tags ORDER BY name"#,
        )
        .fetch_all(&self.db)
        .await
        .context("list tags")?;
        Ok(rows)
    }

    async fn find_tag(&self, id: Uuid) -> anyhow::Result<Option<Tag>> {
        let row = sqlx::query_as::<_, Tag>(
            r#"SELECT id, name, color, slug FROM tags WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find tag")?;
        Ok(row)
    }

    async fn find_tags(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Tag>> {
        let rows = sqlx::query_as::<_, Tag>(
            r#"SELECT id, name, color, slug FROM tags WHERE id = ANY($1)"#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await
        .context("find tags")?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::like_prefix;

    #[test]
    fn like_prefix_appends_wildcard() {
        assert_eq!(like_prefix("sal"), "sal%");
    }

    #[test]
    fn like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("50%_off"), "50\\%\\_off%");
        assert_eq!(like_prefix("a\\b"), "a\\\\b%");
    }
}
