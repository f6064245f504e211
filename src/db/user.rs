use super::DBClient;
use crate::models::{User, UserRole};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, password, role, reset_token, \
    reset_token_expires_at, created_at, updated_at";

/// User database operations trait
pub trait UserExt {
    /// Get single user by id, username, email or password-reset token.
    /// The first `Some` criterion wins.
    async fn get_user(
        &self,
        user_id: Option<&str>,
        username: Option<&str>,
        email: Option<&str>,
        reset_token: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error>;

    /// All users, newest first
    async fn get_users(&self) -> Result<Vec<User>, sqlx::Error>;

    async fn get_user_count(&self) -> Result<i64, sqlx::Error>;

    /// Insert a user with a freshly generated id. `email` must already be lower-cased.
    async fn save_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<User, sqlx::Error>;

    /// Overwrite profile fields; the password only when `password_hash` is given.
    async fn update_user(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
        role: UserRole,
        password_hash: Option<&str>,
    ) -> Result<User, sqlx::Error>;

    async fn delete_user(&self, user_id: &str) -> Result<(), sqlx::Error>;

    async fn set_reset_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    /// Store a new password hash and clear any pending reset token
    async fn update_user_password(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error>;

    /// Drop reset tokens that expired before `now`; returns how many were cleared
    async fn clear_expired_reset_tokens(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error>;
}

impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<&str>,
        username: Option<&str>,
        email: Option<&str>,
        reset_token: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let (column, value) = if let Some(user_id) = user_id {
            ("id", user_id.to_string())
        } else if let Some(username) = username {
            ("username", username.to_string())
        } else if let Some(email) = email {
            ("email", email.to_lowercase())
        } else if let Some(token) = reset_token {
            ("reset_token", token.to_string())
        } else {
            return Ok(None);
        };

        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn get_users(&self) -> Result<Vec<User>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
        sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await
    }

    async fn get_user_count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
    }

    async fn save_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<User, sqlx::Error> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO users (id, username, email, password, role, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .bind(role)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
    }

    async fn update_user(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
        role: UserRole,
        password_hash: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET username = ?, email = ?, role = ?, \
             password = COALESCE(?, password), updated_at = ? \
             WHERE id = ? RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .bind(email)
            .bind(role)
            .bind(password_hash)
            .bind(Utc::now())
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn set_reset_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET reset_token = ?, reset_token_expires_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(token)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_user_password(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET password = ?, reset_token = NULL, reset_token_expires_at = NULL, \
             updated_at = ? WHERE id = ? RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(password_hash)
            .bind(Utc::now())
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn clear_expired_reset_tokens(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET reset_token = NULL, reset_token_expires_at = NULL \
             WHERE reset_token IS NOT NULL AND reset_token_expires_at < ?",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
