//! Recipe list filtering.
//!
//! The same filter is evaluated two ways: as SQL appended to a
//! [`QueryBuilder`] by the Postgres repository, and as a plain predicate
//! over a [`Candidate`] by the in-memory one.

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::ApiError;

/// Raw `GET /recipes` query. `tags` may repeat.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecipeQuery {
    pub author: Option<Uuid>,
    pub tags: Vec<String>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

impl RecipeQuery {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, ApiError> {
        let mut q = RecipeQuery::default();
        for (key, value) in pairs {
            match key.as_str() {
                "author" => {
                    let id = Uuid::parse_str(value.trim())
                        .map_err(|_| ApiError::invalid("author must be a user id"))?;
                    q.author = Some(id);
                }
                "tags" => {
                    let slug = value.trim();
                    if !slug.is_empty() && !q.tags.iter().any(|t| t == slug) {
                        q.tags.push(slug.to_string());
                    }
                }
                "is_favorited" => q.is_favorited = Some(parse_flag(&key, &value)?),
                "is_in_shopping_cart" => q.is_in_shopping_cart = Some(parse_flag(&key, &value)?),
                // Pagination and unknown keys belong to other layers.
                _ => {}
            }
        }
        Ok(q)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(ApiError::invalid(format!("{key} must be one of 0, 1, true, false"))),
    }
}

/// Filter resolved against the acting user. Flag filters only apply to
/// authenticated callers; for anonymous callers they are dropped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    pub tags: Vec<String>,
    pub favorited_by: Option<Uuid>,
    pub in_cart_of: Option<Uuid>,
}

/// What the in-memory predicate needs to know about one recipe.
pub struct Candidate<'a> {
    pub author_id: Uuid,
    pub tag_slugs: &'a [String],
    pub favorited_by: &'a [Uuid],
    pub in_cart_of: &'a [Uuid],
}

impl RecipeFilter {
    pub fn new(query: RecipeQuery, viewer: Option<Uuid>) -> Self {
        let flag_user = |flag: Option<bool>| match (flag, viewer) {
            (Some(true), Some(user)) => Some(user),
            _ => None,
        };
        Self {
            author: query.author,
            favorited_by: flag_user(query.is_favorited),
            in_cart_of: flag_user(query.is_in_shopping_cart),
            tags: query.tags,
        }
    }

    pub fn matches(&self, c: &Candidate<'_>) -> bool {
        if let Some(author) = self.author {
            if c.author_id != author {
                return false;
            }
        }
        if !self.tags.is_empty() && !c.tag_slugs.iter().any(|s| self.tags.contains(s)) {
            return false;
        }
        if let Some(user) = self.favorited_by {
            if !c.favorited_by.contains(&user) {
                return false;
            }
        }
        if let Some(user) = self.in_cart_of {
            if !c.in_cart_of.contains(&user) {
                return false;
            }
        }
        true
    }

    /// Appends ` WHERE ...` conditions over the `r` (recipes) alias.
    pub fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        if let Some(author) = self.author {
            qb.push(" AND r.author_id = ").push_bind(author);
        }
        if !self.tags.is_empty() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(self.tags.clone())
            .push("))");
        }
        if let Some(user) = self.favorited_by {
            qb.push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(user)
                .push(")");
        }
        if let Some(user) = self.in_cart_of {
            qb.push(
                " AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ",
            )
            .push_bind(user)
            .push(")");
        }
    }
}
