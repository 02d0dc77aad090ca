use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod filter;
pub mod handlers;
pub mod relations;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod shopping_list;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::recipe_routes())
}
