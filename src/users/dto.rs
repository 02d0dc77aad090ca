use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::User;
use crate::recipes::dto::RecipeSummary;

/// Request body for account creation.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Returned once after account creation.
#[derive(Debug, Serialize)]
pub struct CreatedUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for CreatedUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
        }
    }
}

/// Public profile as seen by a (possibly anonymous) viewer.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserProfile {
    pub fn new(u: User, is_subscribed: bool) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
            is_subscribed,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub new_password: String,
    pub current_password: String,
}

/// An author in the follower's subscription list.
#[derive(Debug, Serialize)]
pub struct FollowedAuthor {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub recipes: Vec<RecipeSummary>,
    pub recipes_count: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionsQuery {
    pub recipes_limit: Option<i64>,
}
