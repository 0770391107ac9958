use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result, ValidationError, check_required};
use crate::orm::{BoxFuture, Db, Migration, Model, db_timestamp};

use super::LaundryLog;

pub const ITEM_NAME_MAX_LENGTH: usize = 100;

/// A piece of laundry owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LaundryItem {
    pub id: i64,
    pub user_id: i64,
    pub item_name: String,
    pub date_added: DateTime<Utc>,
    pub is_washed: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewLaundryItem {
    pub item_name: String,
    #[serde(default)]
    pub is_washed: bool,
    /// Defaults to now.
    #[serde(default)]
    pub date_added: Option<DateTime<Utc>>,
}

impl NewLaundryItem {
    pub fn new(item_name: impl Into<String>) -> Self {
        NewLaundryItem {
            item_name: item_name.into(),
            ..Default::default()
        }
    }

    pub fn added_at(mut self, date_added: DateTime<Utc>) -> Self {
        self.date_added = Some(date_added);
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        check_required("item_name", &self.item_name, ITEM_NAME_MAX_LENGTH)
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemUpdate {
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub is_washed: Option<bool>,
}

impl fmt::Display for LaundryItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_washed { "Washed" } else { "Unwashed" };
        write!(f, "{} ({})", self.item_name, status)
    }
}

#[async_trait::async_trait]
impl Model for LaundryItem {
    fn table_name() -> &'static str {
        "laundry_items"
    }

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS laundry_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            item_name VARCHAR(100) NOT NULL,
            date_added DATETIME NOT NULL,
            is_washed BOOLEAN NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS laundry_items_user_id ON laundry_items (user_id);"
            .to_string()
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("item_name".into(), "VARCHAR(100) NOT NULL DEFAULT ''".into()),
            ("date_added".into(), "DATETIME NOT NULL DEFAULT '1970-01-01T00:00:00.000000Z'".into()),
            ("is_washed".into(), "BOOLEAN NOT NULL DEFAULT 0".into()),
        ]
    }

    fn verbose_name() -> &'static str {
        "Laundry Item"
    }

    fn verbose_name_plural() -> &'static str {
        "Laundry Items"
    }

    fn ordering() -> &'static str {
        "date_added DESC, id DESC"
    }
}

fn migrate_laundry_items(db: Arc<Db>) -> BoxFuture<'static, Result<()>> {
    LaundryItem::migrate(db)
}

inventory::submit! {
    Migration { table: "laundry_items", order: 2, run: migrate_laundry_items }
}

impl LaundryItem {
    /// Adds an item to `user_id`'s laundry.
    pub async fn create(db: &Db, user_id: i64, new: NewLaundryItem) -> Result<LaundryItem> {
        new.validate()?;

        let mut tx = db.pool().begin().await?;
        let owner: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if owner.is_none() {
            return Err(Error::not_found("User", user_id));
        }

        let item: LaundryItem = sqlx::query_as(
            "INSERT INTO laundry_items (user_id, item_name, date_added, is_washed)
             VALUES (?, ?, ?, ?) RETURNING *",
        )
        .bind(user_id)
        .bind(&new.item_name)
        .bind(db_timestamp(&new.date_added.unwrap_or_else(Utc::now)))
        .bind(new.is_washed)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        log::debug!("added laundry item id={} user_id={}", item.id, user_id);
        Ok(item)
    }

    pub async fn get(db: &Db, id: i64) -> Result<LaundryItem> {
        sqlx::query_as("SELECT * FROM laundry_items WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| Error::not_found("LaundryItem", id))
    }

    pub(crate) async fn exists(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM laundry_items WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row.is_some())
    }

    /// Items owned by `user_id`, newest first.
    pub async fn for_user(db: &Db, user_id: i64) -> Result<Vec<LaundryItem>> {
        let items = sqlx::query_as(&format!(
            "SELECT * FROM laundry_items WHERE user_id = ? ORDER BY {}",
            LaundryItem::ordering()
        ))
        .bind(user_id)
        .fetch_all(db.pool())
        .await?;
        Ok(items)
    }

    /// Every item, newest first.
    pub async fn all(db: &Db) -> Result<Vec<LaundryItem>> {
        let items = sqlx::query_as(&format!(
            "SELECT * FROM laundry_items ORDER BY {}",
            LaundryItem::ordering()
        ))
        .fetch_all(db.pool())
        .await?;
        Ok(items)
    }

    /// Writes back `item_name` and `is_washed`.
    pub async fn save(&self, db: &Db) -> Result<LaundryItem> {
        check_required("item_name", &self.item_name, ITEM_NAME_MAX_LENGTH)?;
        sqlx::query_as(
            "UPDATE laundry_items SET item_name = ?, is_washed = ? WHERE id = ? RETURNING *",
        )
        .bind(&self.item_name)
        .bind(self.is_washed)
        .bind(self.id)
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| Error::not_found("LaundryItem", self.id))
    }

    /// Applies `update` in a single statement; fields left as `None` keep
    /// whatever is stored at write time.
    pub async fn update(db: &Db, id: i64, update: ItemUpdate) -> Result<LaundryItem> {
        if let Some(item_name) = &update.item_name {
            check_required("item_name", item_name, ITEM_NAME_MAX_LENGTH)?;
        }
        sqlx::query_as(
            "UPDATE laundry_items
             SET item_name = COALESCE(?, item_name), is_washed = COALESCE(?, is_washed)
             WHERE id = ? RETURNING *",
        )
        .bind(&update.item_name)
        .bind(update.is_washed)
        .bind(id)
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| Error::not_found("LaundryItem", id))
    }

    /// Flips the washed flag and records a `washed`/`unwashed` log entry.
    pub async fn set_washed(db: &Db, id: i64, washed: bool) -> Result<LaundryItem> {
        let mut tx = db.pool().begin().await?;
        let item: Option<LaundryItem> =
            sqlx::query_as("UPDATE laundry_items SET is_washed = ? WHERE id = ? RETURNING *")
                .bind(washed)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let item = item.ok_or_else(|| Error::not_found("LaundryItem", id))?;

        let action = if washed { "washed" } else { "unwashed" };
        LaundryLog::insert(&mut *tx, id, action, Utc::now()).await?;
        tx.commit().await?;

        log::info!("laundry item id={} marked {}", id, action);
        Ok(item)
    }

    /// Deletes the item together with its logs.
    pub async fn delete(db: &Db, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM laundry_items WHERE id = ?")
            .bind(id)
            .execute(db.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("LaundryItem", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(is_washed: bool) -> LaundryItem {
        LaundryItem {
            id: 1,
            user_id: 1,
            item_name: "Blue shirt".to_string(),
            date_added: Utc::now(),
            is_washed,
        }
    }

    #[test]
    fn display_shows_wash_state() {
        assert_eq!(item(false).to_string(), "Blue shirt (Unwashed)");
        assert_eq!(item(true).to_string(), "Blue shirt (Washed)");
    }

    #[test]
    fn item_name_is_limited_to_100_chars() {
        assert!(NewLaundryItem::new("x".repeat(100)).validate().is_ok());
        let err = NewLaundryItem::new("x".repeat(101)).validate().unwrap_err();
        assert_eq!(err.field, "item_name");
        assert!(NewLaundryItem::new("").validate().is_err());
    }
}
