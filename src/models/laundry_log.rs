use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::sync::Arc;

use crate::error::{Error, Result, ValidationError, check_required};
use crate::orm::{BoxFuture, Db, Migration, Model, db_timestamp};

use super::LaundryItem;

pub const ACTION_MAX_LENGTH: usize = 50;

/// One action taken on a [`LaundryItem`], e.g. `added`, `washed`, `removed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LaundryLog {
    pub id: i64,
    pub item_id: i64,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewLaundryLog {
    pub action: String,
    /// Defaults to now.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewLaundryLog {
    pub fn new(action: impl Into<String>) -> Self {
        NewLaundryLog {
            action: action.into(),
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        check_required("action", &self.action, ACTION_MAX_LENGTH)
    }
}

#[async_trait::async_trait]
impl Model for LaundryLog {
    fn table_name() -> &'static str {
        "laundry_logs"
    }

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS laundry_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id INTEGER NOT NULL REFERENCES laundry_items(id) ON DELETE CASCADE,
            action VARCHAR(50) NOT NULL,
            timestamp DATETIME NOT NULL
        );
        CREATE INDEX IF NOT EXISTS laundry_logs_item_id ON laundry_logs (item_id);"
            .to_string()
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("action".into(), "VARCHAR(50) NOT NULL DEFAULT ''".into()),
            ("timestamp".into(), "DATETIME NOT NULL DEFAULT '1970-01-01T00:00:00.000000Z'".into()),
        ]
    }

    fn verbose_name() -> &'static str {
        "Laundry Log"
    }

    fn verbose_name_plural() -> &'static str {
        "Laundry Logs"
    }

    fn ordering() -> &'static str {
        "timestamp DESC, id DESC"
    }
}

fn migrate_laundry_logs(db: Arc<Db>) -> BoxFuture<'static, Result<()>> {
    LaundryLog::migrate(db)
}

inventory::submit! {
    Migration { table: "laundry_logs", order: 3, run: migrate_laundry_logs }
}

impl LaundryLog {
    /// `"<action> - <item_name> at <timestamp>"`
    pub fn label(&self, item: &LaundryItem) -> String {
        format!("{} - {} at {}", self.action, item.item_name, self.timestamp)
    }

    pub(crate) async fn insert(
        conn: &mut SqliteConnection,
        item_id: i64,
        action: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<LaundryLog> {
        let log = sqlx::query_as(
            "INSERT INTO laundry_logs (item_id, action, timestamp) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(item_id)
        .bind(action)
        .bind(db_timestamp(&timestamp))
        .fetch_one(conn)
        .await?;
        Ok(log)
    }

    /// Records an action against `item_id`.
    pub async fn record(db: &Db, item_id: i64, new: NewLaundryLog) -> Result<LaundryLog> {
        new.validate()?;

        let mut tx = db.pool().begin().await?;
        if !LaundryItem::exists(&mut *tx, item_id).await? {
            return Err(Error::not_found("LaundryItem", item_id));
        }
        let timestamp = new.timestamp.unwrap_or_else(Utc::now);
        let log = LaundryLog::insert(&mut *tx, item_id, &new.action, timestamp).await?;
        tx.commit().await?;
        Ok(log)
    }

    pub async fn get(db: &Db, id: i64) -> Result<LaundryLog> {
        sqlx::query_as("SELECT * FROM laundry_logs WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| Error::not_found("LaundryLog", id))
    }

    /// Logs of `item_id`, newest first.
    pub async fn for_item(db: &Db, item_id: i64) -> Result<Vec<LaundryLog>> {
        let logs = sqlx::query_as(&format!(
            "SELECT * FROM laundry_logs WHERE item_id = ? ORDER BY {}",
            LaundryLog::ordering()
        ))
        .bind(item_id)
        .fetch_all(db.pool())
        .await?;
        Ok(logs)
    }

    pub async fn all(db: &Db) -> Result<Vec<LaundryLog>> {
        let logs = sqlx::query_as(&format!(
            "SELECT * FROM laundry_logs ORDER BY {}",
            LaundryLog::ordering()
        ))
        .fetch_all(db.pool())
        .await?;
        Ok(logs)
    }

    pub async fn delete(db: &Db, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM laundry_logs WHERE id = ?")
            .bind(id)
            .execute(db.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("LaundryLog", id));
        }
        Ok(())
    }
}
