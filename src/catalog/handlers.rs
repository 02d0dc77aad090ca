use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use super::repo_types::{Ingredient, Tag};
use crate::{
    error::ApiError,
    extract::{ApiPath, ApiQuery},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct IngredientSearch {
    pub name: Option<String>,
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients))
        .route("/ingredients/:id", get(get_ingredient))
        .route("/tags", get(list_tags))
        .route("/tags/:id", get(get_tag))
}

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<IngredientSearch>,
) -> Result<Json<Vec<Ingredient>>, ApiError> {
    let prefix = q.name.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let items = state.catalog.search_ingredients(prefix).await?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_ingredient(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Ingredient>, ApiError> {
    state
        .catalog
        .find_ingredient(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Ingredient not found"))
}

#[instrument(skip(state))]
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, ApiError> {
    Ok(Json(state.catalog.list_tags().await?))
}

#[instrument(skip(state))]
pub async fn get_tag(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Tag>, ApiError> {
    state
        .catalog
        .find_tag(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Tag not found"))
}
