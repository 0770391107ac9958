use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;

use crate::error::{Error, Result, ValidationError, check_length, check_required};
use crate::orm::{BoxFuture, Db, Migration, Model, db_timestamp};
use crate::signals;

use super::UserProfile;

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;

/// An account. Every account owns exactly one [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
}

impl NewUser {
    pub fn new(username: impl Into<String>) -> Self {
        NewUser {
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        validate_fields(&self.username, self.email.as_deref())
    }
}

fn validate_fields(username: &str, email: Option<&str>) -> std::result::Result<(), ValidationError> {
    check_required("username", username, USERNAME_MAX_LENGTH)?;
    if let Some(email) = email {
        check_length("email", email, EMAIL_MAX_LENGTH)?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl Model for User {
    fn table_name() -> &'static str {
        "users"
    }

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username VARCHAR(150) NOT NULL UNIQUE,
            email VARCHAR(254),
            is_staff BOOLEAN NOT NULL DEFAULT 0,
            date_joined DATETIME NOT NULL
        )"
        .to_string()
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("username".into(), "VARCHAR(150) NOT NULL DEFAULT ''".into()),
            ("email".into(), "VARCHAR(254)".into()),
            ("is_staff".into(), "BOOLEAN NOT NULL DEFAULT 0".into()),
            ("date_joined".into(), "DATETIME NOT NULL DEFAULT '1970-01-01T00:00:00.000000Z'".into()),
        ]
    }

    fn verbose_name() -> &'static str {
        "User"
    }

    fn verbose_name_plural() -> &'static str {
        "Users"
    }
}

fn migrate_users(db: Arc<Db>) -> BoxFuture<'static, Result<()>> {
    User::migrate(db)
}

inventory::submit! {
    Migration { table: "users", order: 0, run: migrate_users }
}

impl User {
    /// Inserts the account and provisions its profile in one transaction.
    pub async fn create(db: &Db, new: NewUser) -> Result<User> {
        new.validate()?;

        let mut tx = db.pool().begin().await?;
        let user: User = sqlx::query_as(
            "INSERT INTO users (username, email, is_staff, date_joined)
             VALUES (?, ?, ?, ?) RETURNING *",
        )
        .bind(&new.username)
        .bind(&new.email)
        .bind(new.is_staff)
        .bind(db_timestamp(&Utc::now()))
        .fetch_one(&mut *tx)
        .await?;

        signals::user_post_save(&mut *tx, &user, true).await?;
        tx.commit().await?;

        log::info!("created user id={} username={}", user.id, user.username);
        Ok(user)
    }

    /// Writes back `username`, `email` and `is_staff`, then re-saves the profile.
    pub async fn save(&self, db: &Db) -> Result<User> {
        validate_fields(&self.username, self.email.as_deref())?;

        let mut tx = db.pool().begin().await?;
        let saved: Option<User> = sqlx::query_as(
            "UPDATE users SET username = ?, email = ?, is_staff = ? WHERE id = ? RETURNING *",
        )
        .bind(&self.username)
        .bind(&self.email)
        .bind(self.is_staff)
        .bind(self.id)
        .fetch_optional(&mut *tx)
        .await?;
        let saved = saved.ok_or_else(|| Error::not_found("User", self.id))?;

        signals::user_post_save(&mut *tx, &saved, false).await?;
        tx.commit().await?;
        Ok(saved)
    }

    pub async fn get(db: &Db, id: i64) -> Result<User> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| Error::not_found("User", id))
    }

    pub async fn get_by_username(db: &Db, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(db.pool())
            .await?;
        Ok(user)
    }

    pub async fn all(db: &Db) -> Result<Vec<User>> {
        let users = sqlx::query_as(&format!(
            "SELECT * FROM users ORDER BY {}",
            User::ordering()
        ))
        .fetch_all(db.pool())
        .await?;
        Ok(users)
    }

    /// Deletes the account; profile, items and logs go with it.
    pub async fn delete(db: &Db, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(db.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("User", id));
        }
        log::info!("deleted user id={}", id);
        Ok(())
    }

    pub async fn profile(&self, db: &Db) -> Result<UserProfile> {
        UserProfile::for_user(db, self.id).await
    }
}
