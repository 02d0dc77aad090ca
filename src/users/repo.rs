use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewUser, User};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    /// All users ordered by username.
    async fn list(&self) -> anyhow::Result<Vec<User>>;
    /// Returns `None` when the email or username is already taken.
    async fn create(&self, new: &NewUser<'_>) -> anyhow::Result<Option<User>>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool>;
    /// Returns `false` when the follow already existed.
    async fn insert_follow(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool>;
    /// Returns `false` when there was nothing to delete.
    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool>;
    /// Authors followed by `user_id`, ordered by username.
    async fn list_following(&self, user_id: Uuid) -> anyhow::Result<Vec<User>>;
    async fn following_ids(&self, user_id: Uuid) -> anyhow::Result<Vec<Uuid>>;
}

pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const USER_COLUMNS: &str =
    "id, email, username, first_name, last_name, password_hash, is_admin, created_at";

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.db)
        .await
        .context("find users by id")?;
        Ok(users)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY username"
        ))
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(users)
    }

    async fn create(&self, new: &NewUser<'_>) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, username, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.email)
        .bind(new.username)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.password_hash)
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE users SET password_hash = $2 WHERE id = $1"#)
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await
            .context("update password")?;
        Ok(())
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)"#,
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(&self.db)
        .await
        .context("check follow")?;
        Ok(exists)
    }

    async fn insert_follow(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            INSERT INTO follows (user_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, author_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(author_id)
        .execute(&self.db)
        .await
        .context("insert follow")?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"DELETE FROM follows WHERE user_id = $1 AND author_id = $2"#)
            .bind(user_id)
            .bind(author_id)
            .execute(&self.db)
            .await
            .context("delete follow")?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_following(&self, user_id: Uuid) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.username, u.first_name, u.last_name,
                   u.password_hash, u.is_admin, u.created_at
            FROM users u
            JOIN follows f ON f.author_id = u.id
            WHERE f.user_id = $1
            ORDER BY u.username
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list following")?;
        Ok(users)
    }

    async fn following_ids(&self, user_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"SELECT author_id FROM follows WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list following ids")?;
        Ok(ids)
    }
}
