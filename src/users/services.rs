use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{CreateUserRequest, FollowedAuthor, SetPasswordRequest, UserProfile},
    repo_types::{NewUser, User},
    validators::{is_valid_email, validate_person_name, validate_username},
};
use crate::{
    auth::password::{hash_password, validate_password, verify_password},
    error::ApiError,
    recipes::dto::RecipeSummary,
    state::AppState,
};

pub async fn create_user(st: &AppState, mut req: CreateUserRequest) -> Result<User, ApiError> {
    req.email = req.email.trim().to_lowercase();
    req.username = req.username.trim().to_string();

    if !is_valid_email(&req.email) {
        warn!(email = %req.email, "invalid email");
        return Err(ApiError::invalid("Invalid email"));
    }
    validate_username(&req.username)?;
    validate_person_name("first_name", &req.first_name)?;
    validate_person_name("last_name", &req.last_name)?;
    validate_password(&req.password)?;

    if st.users.find_by_email(&req.email).await?.is_some() {
        warn!(email = %req.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }
    if st.users.find_by_username(&req.username).await?.is_some() {
        warn!(username = %req.username, "username already taken");
        return Err(ApiError::Conflict("Username already taken".into()));
    }

    let hash = hash_password(&req.password)?;
    let new = NewUser {
        email: &req.email,
        username: &req.username,
        first_name: req.first_name.trim(),
        last_name: req.last_name.trim(),
        password_hash: &hash,
    };
    // A concurrent registration may still win the unique constraint.
    let user = st
        .users
        .create(&new)
        .await?
        .ok_or_else(|| ApiError::Conflict("Email or username already registered".into()))?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

pub async fn load_user(st: &AppState, id: Uuid) -> Result<User, ApiError> {
    st.users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// The user behind a verified token. A token for a deleted account is
/// treated as bad credentials.
pub async fn current_user(st: &AppState, id: Uuid) -> Result<User, ApiError> {
    st.users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))
}

pub async fn profile(st: &AppState, user: User, viewer: Option<Uuid>) -> Result<UserProfile, ApiError> {
    let is_subscribed = match viewer {
        Some(viewer_id) => st.users.is_following(viewer_id, user.id).await?,
        None => false,
    };
    Ok(UserProfile::new(user, is_subscribed))
}

pub async fn list_profiles(st: &AppState, viewer: Option<Uuid>) -> Result<Vec<UserProfile>, ApiError> {
    let following = match viewer {
        Some(viewer_id) => st.users.following_ids(viewer_id).await?,
        None => Vec::new(),
    };
    let users = st.users.list().await?;
    Ok(users
        .into_iter()
        .map(|u| {
            let subscribed = following.contains(&u.id);
            UserProfile::new(u, subscribed)
        })
        .collect())
}

pub async fn set_password(
    st: &AppState,
    user_id: Uuid,
    req: SetPasswordRequest,
) -> Result<(), ApiError> {
    let user = current_user(st, user_id).await?;
    if !verify_password(&req.current_password, &user.password_hash)? {
        warn!(user_id = %user_id, "set_password with wrong current password");
        return Err(ApiError::invalid("Current password is incorrect"));
    }
    validate_password(&req.new_password)?;
    let hash = hash_password(&req.new_password)?;
    st.users.update_password(user_id, &hash).await?;
    info!(user_id = %user_id, "password changed");
    Ok(())
}

fn resolve_limit(st: &AppState, recipes_limit: Option<i64>) -> Result<i64, ApiError> {
    match recipes_limit {
        Some(n) if n < 0 => Err(ApiError::invalid("recipes_limit must not be negative")),
        Some(n) => Ok(n),
        None => Ok(st.config.subscription_recipes_limit),
    }
}

async fn followed_author(st: &AppState, author: User, limit: i64) -> Result<FollowedAuthor, ApiError> {
    let recipes = st
        .recipes
        .list_by_author(author.id, Some(limit))
        .await?
        .iter()
        .map(RecipeSummary::from)
        .collect();
    let recipes_count = st.recipes.count_by_author(author.id).await?;
    Ok(FollowedAuthor {
        profile: UserProfile::new(author, true),
        recipes,
        recipes_count,
    })
}

pub async fn follow(
    st: &AppState,
    user_id: Uuid,
    author_id: Uuid,
    recipes_limit: Option<i64>,
) -> Result<FollowedAuthor, ApiError> {
    if user_id == author_id {
        warn!(user_id = %user_id, "attempt to follow self");
        return Err(ApiError::invalid("You cannot follow yourself"));
    }
    if st.users.is_following(user_id, author_id).await? {
        warn!(user_id = %user_id, author_id = %author_id, "already following");
        return Err(ApiError::Conflict("You already follow this user".into()));
    }
    let author = load_user(st, author_id).await?;
    let limit = resolve_limit(st, recipes_limit)?;
    current_user(st, user_id).await?;

    if !st.users.insert_follow(user_id, author_id).await? {
        return Err(ApiError::Conflict("You already follow this user".into()));
    }
    info!(user_id = %user_id, author_id = %author_id, "follow created");

    followed_author(st, author, limit).await
}

pub async fn unfollow(st: &AppState, user_id: Uuid, author_id: Uuid) -> Result<(), ApiError> {
    load_user(st, author_id).await?;
    current_user(st, user_id).await?;
    if st.users.delete_follow(user_id, author_id).await? {
        info!(user_id = %user_id, author_id = %author_id, "follow removed");
    }
    Ok(())
}

pub async fn list_following(
    st: &AppState,
    user_id: Uuid,
    recipes_limit: Option<i64>,
) -> Result<Vec<FollowedAuthor>, ApiError> {
    let limit = resolve_limit(st, recipes_limit)?;
    current_user(st, user_id).await?;
    let authors = st.users.list_following(user_id).await?;
    let mut out = Vec::with_capacity(authors.len());
    for author in authors {
        out.push(followed_author(st, author, limit).await?);
    }
    Ok(out)
}
