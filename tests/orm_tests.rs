use laundry::orm::{self, Db, Model};
use std::sync::Arc;

#[tokio::test]
async fn test_db_basic_crud() {
    use sqlx::FromRow;

    #[derive(Debug, FromRow, PartialEq, Eq)]
    struct Person {
        name: String,
    }

    let db = Db::connect(":memory:").await.unwrap();
    db.execute("CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT)")
        .await
        .unwrap();
    db.execute("INSERT INTO person (name) VALUES ('Alice')")
        .await
        .unwrap();

    let people: Vec<Person> = db.fetch_all("SELECT name FROM person").await.unwrap();
    let names: Vec<String> = people.into_iter().map(|person| person.name).collect();
    assert_eq!(names, vec!["Alice"]);
}

#[tokio::test]
async fn test_foreign_keys_are_enforced() {
    let db = Db::connect("sqlite::memory:").await.unwrap();
    let (enabled,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(enabled, 1);
}

#[tokio::test]
async fn test_auto_migrate_creates_all_tables_and_is_idempotent() {
    let db = Arc::new(Db::connect("sqlite::memory:").await.unwrap());
    orm::auto_migrate(db.clone()).await.unwrap();
    orm::auto_migrate(db.clone()).await.unwrap();

    let tables: Vec<(String,)> = db
        .fetch_all("SELECT table_name FROM __laundry_models ORDER BY table_name")
        .await
        .unwrap();
    let tables: Vec<String> = tables.into_iter().map(|(t,)| t).collect();
    assert_eq!(
        tables,
        vec!["laundry_items", "laundry_logs", "user_profiles", "users"]
    );

    assert_eq!(
        orm::registered_tables(),
        vec!["users", "user_profiles", "laundry_items", "laundry_logs"]
    );
}

struct WidgetV1;
struct WidgetV2;

#[async_trait::async_trait]
impl Model for WidgetV1 {
    fn table_name() -> &'static str {
        "widgets"
    }
    fn create_table_sql() -> String {
        "CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT)".to_string()
    }
    fn columns() -> Vec<(String, String)> {
        vec![("name".into(), "TEXT".into())]
    }
    fn verbose_name() -> &'static str {
        "Widget"
    }
    fn verbose_name_plural() -> &'static str {
        "Widgets"
    }
}

#[async_trait::async_trait]
impl Model for WidgetV2 {
    fn table_name() -> &'static str {
        "widgets"
    }
    fn create_table_sql() -> String {
        "CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT, color TEXT)".to_string()
    }
    fn columns() -> Vec<(String, String)> {
        vec![
            ("name".into(), "TEXT".into()),
            ("color".into(), "TEXT".into()),
        ]
    }
    fn verbose_name() -> &'static str {
        "Widget"
    }
    fn verbose_name_plural() -> &'static str {
        "Widgets"
    }
}

#[tokio::test]
async fn test_model_migration_adds_missing_columns() {
    let db = Arc::new(Db::connect("sqlite::memory:").await.unwrap());
    WidgetV1::migrate(db.clone()).await.unwrap();
    WidgetV2::migrate(db.clone()).await.unwrap();

    let columns: Vec<(String,)> = db
        .fetch_all("SELECT name FROM pragma_table_info('widgets') ORDER BY cid")
        .await
        .unwrap();
    let columns: Vec<String> = columns.into_iter().map(|(c,)| c).collect();
    assert_eq!(columns, vec!["id", "name", "color"]);

    // The recorded hash now matches V2, so a rerun is a no-op.
    WidgetV2::migrate(db.clone()).await.unwrap();
}

#[tokio::test]
async fn test_apply_migration_files_runs_each_file_once() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("0001_colors.sql"),
        "CREATE TABLE colors (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("0002_seed.sql"),
        "INSERT INTO colors (name) VALUES ('white'); INSERT INTO colors (name) VALUES ('dark');",
    )
    .unwrap();
    std::fs::write(dir.path().join("README.txt"), "not a migration").unwrap();

    let db = Arc::new(Db::connect("sqlite::memory:").await.unwrap());
    let dir_path = dir.path().to_str().unwrap();

    let applied = orm::apply_migration_files(db.clone(), dir_path)
        .await
        .unwrap();
    assert_eq!(applied, vec!["0001_colors.sql", "0002_seed.sql"]);

    let applied = orm::apply_migration_files(db.clone(), dir_path)
        .await
        .unwrap();
    assert!(applied.is_empty());

    let colors: Vec<(String,)> = db
        .fetch_all("SELECT name FROM colors ORDER BY id")
        .await
        .unwrap();
    assert_eq!(colors.len(), 2);
}

#[tokio::test]
async fn test_file_database_persists_between_connections() {
    let dir = tempfile::tempdir().unwrap();
    let uri = format!("sqlite://{}", dir.path().join("laundry.db").display());

    {
        let db = Arc::new(Db::connect(&uri).await.unwrap());
        orm::auto_migrate(db.clone()).await.unwrap();
        laundry::User::create(&db, laundry::models::NewUser::new("ana"))
            .await
            .unwrap();
        db.close().await;
    }

    let db = Db::connect(&uri).await.unwrap();
    let users = laundry::User::all(&db).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].username, "ana");
}
