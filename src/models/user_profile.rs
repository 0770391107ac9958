use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::sync::Arc;

use crate::error::{Error, Result, ValidationError, check_length};
use crate::orm::{BoxFuture, Db, Migration, Model};

use super::User;

pub const PHONE_NUMBER_MAX_LENGTH: usize = 15;
pub const ADDRESS_MAX_LENGTH: usize = 255;

/// Contact details attached one-to-one to a [`User`].
///
/// Profiles are never created by callers: the user post-save receivers in
/// [`crate::signals`] provision them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: i64,
    pub user_id: i64,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if let Some(phone) = &self.phone_number {
            check_length("phone_number", phone, PHONE_NUMBER_MAX_LENGTH)?;
        }
        if let Some(address) = &self.address {
            check_length("address", address, ADDRESS_MAX_LENGTH)?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Model for UserProfile {
    fn table_name() -> &'static str {
        "user_profiles"
    }

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS user_profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            phone_number VARCHAR(15),
            address VARCHAR(255)
        )"
        .to_string()
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("phone_number".into(), "VARCHAR(15)".into()),
            ("address".into(), "VARCHAR(255)".into()),
        ]
    }

    fn verbose_name() -> &'static str {
        "User Profile"
    }

    fn verbose_name_plural() -> &'static str {
        "User Profiles"
    }
}

fn migrate_user_profiles(db: Arc<Db>) -> BoxFuture<'static, Result<()>> {
    UserProfile::migrate(db)
}

inventory::submit! {
    Migration { table: "user_profiles", order: 1, run: migrate_user_profiles }
}

impl UserProfile {
    /// `"<username>'s Profile"`
    pub fn label(&self, user: &User) -> String {
        format!("{}'s Profile", user.username)
    }

    pub(crate) async fn create_for(conn: &mut SqliteConnection, user_id: i64) -> Result<UserProfile> {
        let profile = sqlx::query_as("INSERT INTO user_profiles (user_id) VALUES (?) RETURNING *")
            .bind(user_id)
            .fetch_one(conn)
            .await?;
        Ok(profile)
    }

    /// Re-saves the profile of `user_id`, inserting it if it is missing.
    pub(crate) async fn resave_for(conn: &mut SqliteConnection, user_id: i64) -> Result<UserProfile> {
        let profile = sqlx::query_as(
            "INSERT INTO user_profiles (user_id) VALUES (?)
             ON CONFLICT(user_id) DO UPDATE SET
                 phone_number = user_profiles.phone_number,
                 address = user_profiles.address
             RETURNING *",
        )
        .bind(user_id)
        .fetch_one(conn)
        .await?;
        Ok(profile)
    }

    pub async fn for_user(db: &Db, user_id: i64) -> Result<UserProfile> {
        sqlx::query_as("SELECT * FROM user_profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| Error::not_found("UserProfile", user_id))
    }

    pub async fn get(db: &Db, id: i64) -> Result<UserProfile> {
        sqlx::query_as("SELECT * FROM user_profiles WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| Error::not_found("UserProfile", id))
    }

    pub async fn all(db: &Db) -> Result<Vec<UserProfile>> {
        let profiles = sqlx::query_as(&format!(
            "SELECT * FROM user_profiles ORDER BY {}",
            UserProfile::ordering()
        ))
        .fetch_all(db.pool())
        .await?;
        Ok(profiles)
    }

    /// Replaces the phone number and address of the profile owned by `user_id`.
    pub async fn update(db: &Db, user_id: i64, update: ProfileUpdate) -> Result<UserProfile> {
        update.validate()?;
        sqlx::query_as(
            "UPDATE user_profiles SET phone_number = ?, address = ? WHERE user_id = ? RETURNING *",
        )
        .bind(&update.phone_number)
        .bind(&update.address)
        .bind(user_id)
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| Error::not_found("UserProfile", user_id))
    }
}
