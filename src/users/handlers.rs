use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{CreateUserRequest, CreatedUser, FollowedAuthor, SetPasswordRequest, SubscriptionsQuery, UserProfile},
    services,
};
use crate::{
    auth::{AuthUser, MaybeAuthUser},
    error::ApiError,
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/me", get(get_me))
        .route("/users/set_password", post(set_password))
        .route("/users/subscriptions", get(list_subscriptions))
        .route("/users/:id", get(get_user))
        .route("/users/:id/subscribe", post(subscribe).delete(unsubscribe))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreatedUser>), ApiError> {
    let user = services::create_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(CreatedUser::from(user))))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    Ok(Json(services::list_profiles(&state, viewer).await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = services::load_user(&state, id).await?;
    Ok(Json(services::profile(&state, user, viewer).await?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserProfile>, ApiError> {
    let user = services::current_user(&state, user_id).await?;
    Ok(Json(UserProfile::new(user, false)))
}

#[instrument(skip(state, payload))]
pub async fn set_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<SetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    services::set_password(&state, user_id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(author_id): ApiPath<Uuid>,
    ApiQuery(q): ApiQuery<SubscriptionsQuery>,
) -> Result<(StatusCode, Json<FollowedAuthor>), ApiError> {
    let author = services::follow(&state, user_id, author_id, q.recipes_limit).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

#[instrument(skip(state))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(author_id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    services::unfollow(&state, user_id, author_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiQuery(q): ApiQuery<SubscriptionsQuery>,
) -> Result<Json<Vec<FollowedAuthor>>, ApiError> {
    Ok(Json(
        services::list_following(&state, user_id, q.recipes_limit).await?,
    ))
}
