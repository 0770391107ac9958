//! Minimal async ORM layer (sqlite + sqlx)
//!
//! Usage:
//! let db = Db::connect("sqlite::memory:").await?;
//! laundry::orm::auto_migrate(Arc::new(db.clone())).await?;
//! let users: Vec<User> = db.fetch_all("SELECT * FROM users").await?;
use chrono::{DateTime, Utc};
pub use futures::future::BoxFuture;
use log::{debug, info};
use sha2::{Digest, Sha256};
pub use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, Row, SqlitePool};
use std::fs;
use std::str::FromStr;
use std::sync::Arc;
use walkdir::WalkDir;

use crate::error::Result;

const MODELS_TABLE: &str = "__laundry_models";
const MIGRATIONS_TABLE: &str = "__laundry_migrations";

/// Stored form of timestamp columns: UTC, microseconds, fixed width, so that
/// comparing the text orders rows chronologically.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Formats `at` the way timestamp columns store it.
pub fn db_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// An async database pool wrapper.
#[derive(Clone, Debug)]
pub struct Db {
    pool: SqlitePool,
}

/// Migration function pointer for a model.
pub type MigrationFn = fn(Arc<Db>) -> BoxFuture<'static, Result<()>>;

/// A model migration registered through `inventory::submit!`.
///
/// `order` decides the run order in [`auto_migrate`]; parents use lower values
/// than the tables that reference them.
pub struct Migration {
    pub table: &'static str,
    pub order: u32,
    pub run: MigrationFn,
}

inventory::collect!(Migration);

#[async_trait::async_trait]
pub trait Model: Send + Sync {
    fn table_name() -> &'static str;
    fn create_table_sql() -> String;
    fn columns() -> Vec<(String, String)>;

    fn verbose_name() -> &'static str;
    fn verbose_name_plural() -> &'static str;

    /// Default `ORDER BY` clause used by listings.
    fn ordering() -> &'static str {
        "id ASC"
    }

    async fn migrate(db: Arc<Db>) -> Result<()> {
        let table_name = Self::table_name();
        let create_sql = Self::create_table_sql();
        let schema_hash = hash(&create_sql);

        db.execute(&format!(
            "CREATE TABLE IF NOT EXISTS {MODELS_TABLE} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                table_name TEXT UNIQUE NOT NULL,
                schema_sql TEXT NOT NULL,
                hash TEXT NOT NULL,
                applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )"
        ))
        .await?;

        let row: Option<(String,)> = sqlx::query_as(&format!(
            "SELECT hash FROM {MODELS_TABLE} WHERE table_name = ?"
        ))
        .bind(table_name)
        .fetch_optional(db.pool())
        .await?;

        let Some((recorded_hash,)) = row else {
            db.execute(&create_sql).await?;
            sqlx::query(&format!(
                "INSERT INTO {MODELS_TABLE} (table_name, schema_sql, hash) VALUES (?, ?, ?)"
            ))
            .bind(table_name)
            .bind(&create_sql)
            .bind(&schema_hash)
            .execute(db.pool())
            .await?;
            info!(
                "Migrated `{}` (table created, initial schema applied).",
                table_name
            );
            return Ok(());
        };

        if recorded_hash == schema_hash {
            debug!("Schema hash unchanged for `{}`.", table_name);
            return Ok(());
        }

        // Get existing cols from DB
        let existing: Vec<String> = sqlx::query(&format!("PRAGMA table_info({table_name})"))
            .fetch_all(db.pool())
            .await?
            .into_iter()
            .map(|row: sqlx::sqlite::SqliteRow| row.get::<String, _>("name"))
            .collect();

        let mut added = Vec::new();
        for (name, sqltype) in Self::columns() {
            if !existing.contains(&name) {
                db.execute(&format!(
                    "ALTER TABLE {table_name} ADD COLUMN {name} {sqltype};"
                ))
                .await?;
                added.push((name, sqltype));
            }
        }

        if added.is_empty() {
            info!("No column changes detected for `{}`.", table_name);
        } else {
            info!(
                "Schema changes detected for `{}`; the following columns were added:",
                table_name
            );
            for (name, sqltype) in &added {
                info!("  - {} {}", name, sqltype);
            }
        }

        sqlx::query(&format!(
            "UPDATE {MODELS_TABLE} SET schema_sql = ?, hash = ?, applied_at = CURRENT_TIMESTAMP \
             WHERE table_name = ?"
        ))
        .bind(&create_sql)
        .bind(&schema_hash)
        .bind(table_name)
        .execute(db.pool())
        .await?;
        Ok(())
    }
}

// Helper function to hash a SQL string
fn hash(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Db {
    /// Connect (or create) a SQLite database at the given URI.
    ///
    /// Foreign keys are always enforced. In-memory databases are pinned to a
    /// single connection that is never recycled, otherwise each pooled
    /// connection would see its own empty database.
    pub async fn connect(uri: &str) -> Result<Self> {
        info!("Connecting to SQLite database at URI: {}", uri);
        let options = SqliteConnectOptions::from_str(uri)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if uri.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options.connect_with(options).await?;
        info!("Connected to SQLite database: {}", uri);
        Ok(Db { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Execute an arbitrary SQL statement, e.g. DDL, INSERT, UPDATE.
    pub async fn execute(&self, sql: &str) -> Result<()> {
        debug!("Executing SQL: {}", sql);
        let result = self.pool.execute(sql).await;
        match &result {
            Ok(_) => debug!("SQL executed successfully"),
            Err(e) => log::error!("SQL execution failed: {}", e),
        }
        result?;
        Ok(())
    }

    /// Fetch all rows and map to a type implementing `FromRow`.
    pub async fn fetch_all<T: for<'r> FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin>(
        &self,
        sql: &str,
    ) -> Result<Vec<T>> {
        debug!("Fetching rows with SQL: {}", sql);
        let result = sqlx::query_as(sql).fetch_all(&self.pool).await;
        match &result {
            Ok(rows) => debug!("Fetched {} rows successfully", rows.len()),
            Err(e) => log::error!("Row fetch failed: {}", e),
        }
        Ok(result?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Migrate all registered models using the inventory pattern.
pub async fn auto_migrate(db: Arc<Db>) -> Result<()> {
    info!("Starting auto migration of all registered models...");
    let mut migrations: Vec<&Migration> = inventory::iter::<Migration>.into_iter().collect();
    migrations.sort_by_key(|m| (m.order, m.table));

    for m in &migrations {
        if let Err(e) = (m.run)(db.clone()).await {
            log::error!("Auto-migration failed for `{}`: {}", m.table, e);
            return Err(e);
        }
    }
    info!("Auto migration completed for {} models.", migrations.len());
    Ok(())
}

/// Tables of all registered models, in migration order.
pub fn registered_tables() -> Vec<&'static str> {
    let mut migrations: Vec<&Migration> = inventory::iter::<Migration>.into_iter().collect();
    migrations.sort_by_key(|m| (m.order, m.table));
    migrations.into_iter().map(|m| m.table).collect()
}

/// Applies file-based migrations located in the `migrations_dir` directory.
/// Each migration file should be a *.sql file.
/// Already-applied migrations are skipped based on filename tracking.
/// Returns the filenames applied by this call.
pub async fn apply_migration_files(db: Arc<Db>, migrations_dir: &str) -> Result<Vec<String>> {
    db.execute(&format!(
        "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT UNIQUE NOT NULL,
            applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )"
    ))
    .await?;

    // List .sql files in migrations directory, sorted by filename
    let mut files: Vec<_> = WalkDir::new(migrations_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|f| f.file_type().is_file())
        .filter(|f| f.path().extension().map(|e| e == "sql").unwrap_or(false))
        .collect();
    files.sort_by_key(|f| f.file_name().to_os_string());

    let mut applied_now = Vec::new();
    for entry in files {
        let filename = entry.file_name().to_string_lossy().to_string();
        let applied: Option<(String,)> = sqlx::query_as(&format!(
            "SELECT filename FROM {MIGRATIONS_TABLE} WHERE filename = ?"
        ))
        .bind(&filename)
        .fetch_optional(db.pool())
        .await?;
        if applied.is_some() {
            info!("Migration `{}` already applied.", filename);
            continue;
        }

        let sql = fs::read_to_string(entry.path())?;
        info!("Applying migration file: {}", filename);
        let mut tx = db.pool().begin().await?;
        (&mut *tx).execute(sql.as_str()).await?;
        sqlx::query(&format!(
            "INSERT INTO {MIGRATIONS_TABLE} (filename) VALUES (?)"
        ))
        .bind(&filename)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        info!("Migration `{}` applied.", filename);
        applied_now.push(filename);
    }

    Ok(applied_now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn db_timestamps_are_fixed_width_and_sort_chronologically() {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let whole = db_timestamp(&base);
        let later = db_timestamp(&(base + Duration::microseconds(400)));

        assert_eq!(whole, "2024-03-01T12:00:00.000000Z");
        assert_eq!(later, "2024-03-01T12:00:00.000400Z");
        assert_eq!(whole.len(), later.len());
        assert!(later > whole);
        assert!(db_timestamp(&(base + Duration::seconds(1))) > later);
    }
}
