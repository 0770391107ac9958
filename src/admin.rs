//! Admin registration for the laundry models.
//!
//! Each administered model submits an [`AdminEntry`]; the router exposes the
//! registry under `/admin` and serves each model's rows in its admin ordering.

use serde::Serialize;
use sqlx::FromRow;
use sqlx::sqlite::SqliteRow;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{LaundryItem, LaundryLog, User, UserProfile};
use crate::orm::{BoxFuture, Db, Model};

/// Display metadata for an administered model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelMeta {
    pub key: &'static str,
    pub table: &'static str,
    pub verbose_name: &'static str,
    pub verbose_name_plural: &'static str,
    pub ordering: &'static str,
    pub list_display: &'static [&'static str],
}

pub type RowsFn = fn(Arc<Db>) -> BoxFuture<'static, Result<Vec<serde_json::Value>>>;

pub struct AdminEntry {
    pub key: &'static str,
    pub list_display: &'static [&'static str],
    pub meta: fn(&'static str, &'static [&'static str]) -> ModelMeta,
    pub rows: RowsFn,
}

inventory::collect!(AdminEntry);

impl AdminEntry {
    pub fn meta(&self) -> ModelMeta {
        (self.meta)(self.key, self.list_display)
    }
}

pub fn meta<T: Model>(key: &'static str, list_display: &'static [&'static str]) -> ModelMeta {
    ModelMeta {
        key,
        table: T::table_name(),
        verbose_name: T::verbose_name(),
        verbose_name_plural: T::verbose_name_plural(),
        ordering: T::ordering(),
        list_display,
    }
}

/// Every row of `T`'s table in its default ordering, as JSON objects.
pub fn rows<T>(db: Arc<Db>) -> BoxFuture<'static, Result<Vec<serde_json::Value>>>
where
    T: Model + Serialize + for<'r> FromRow<'r, SqliteRow> + Send + Unpin + 'static,
{
    Box::pin(async move {
        let sql = format!(
            "SELECT * FROM {} ORDER BY {}",
            T::table_name(),
            T::ordering()
        );
        let records: Vec<T> = db.fetch_all(&sql).await?;
        let values = records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| crate::error::Error::Server(err.to_string()))?;
        Ok(values)
    })
}

inventory::submit! {
    AdminEntry {
        key: "user",
        list_display: &["username", "email", "is_staff", "date_joined"],
        meta: meta::<User>,
        rows: rows::<User>,
    }
}

inventory::submit! {
    AdminEntry {
        key: "laundry_item",
        list_display: &["item_name", "user_id", "date_added", "is_washed"],
        meta: meta::<LaundryItem>,
        rows: rows::<LaundryItem>,
    }
}

inventory::submit! {
    AdminEntry {
        key: "laundry_log",
        list_display: &["action", "item_id", "timestamp"],
        meta: meta::<LaundryLog>,
        rows: rows::<LaundryLog>,
    }
}

inventory::submit! {
    AdminEntry {
        key: "user_profile",
        list_display: &["user_id", "phone_number", "address"],
        meta: meta::<UserProfile>,
        rows: rows::<UserProfile>,
    }
}

/// Registered models sorted by key.
pub fn registered() -> Vec<&'static AdminEntry> {
    let mut entries: Vec<&'static AdminEntry> = inventory::iter::<AdminEntry>.into_iter().collect();
    entries.sort_by_key(|entry| entry.key);
    entries
}

pub fn find(key: &str) -> Option<&'static AdminEntry> {
    inventory::iter::<AdminEntry>
        .into_iter()
        .find(|entry| entry.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_models_are_registered() {
        let keys: Vec<&str> = registered().iter().map(|entry| entry.key).collect();
        assert_eq!(keys, ["laundry_item", "laundry_log", "user", "user_profile"]);
    }

    #[test]
    fn meta_carries_verbose_names() {
        let meta = find("laundry_item").unwrap().meta();
        assert_eq!(meta.table, "laundry_items");
        assert_eq!(meta.verbose_name, "Laundry Item");
        assert_eq!(meta.verbose_name_plural, "Laundry Items");
        assert!(meta.ordering.contains("DESC"));
        assert!(find("laundry").is_none());
    }
}
