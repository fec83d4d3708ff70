//! Integration tests for per-call transactions.
//!
//! Uses file-backed SQLite so several pools can observe the same data.

use forum_db::config::DatabaseConfig;
use forum_db::db::{Database, MemoryScripts};
use forum_db::error::DbError;
use forum_db::models::{Query, Value};
use std::sync::Arc;
use tempfile::NamedTempFile;

const INIT_SQL: &str = "
CREATE TABLE IF NOT EXISTS forums (
    slug TEXT PRIMARY KEY,
    title TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS threads (
    id INTEGER PRIMARY KEY,
    forum TEXT NOT NULL REFERENCES forums(slug) DEFERRABLE INITIALLY DEFERRED,
    title TEXT NOT NULL,
    votes REAL,
    attachment BLOB
);
";

fn database(file: &NamedTempFile, max_connections: u32) -> Database<MemoryScripts> {
    let config = DatabaseConfig::parse(&format!(
        "sqlite:{}?mode=rwc&max_connections={}",
        file.path().display(),
        max_connections
    ))
    .unwrap();
    let scripts = MemoryScripts::new().with(config.scripts.init.clone(), INIT_SQL);
    Database::new(config, scripts)
}

async fn open_database(file: &NamedTempFile, max_connections: u32) -> Database<MemoryScripts> {
    let db = database(file, max_connections);
    db.open(false).await.unwrap();
    db
}

async fn count(db: &Database<MemoryScripts>, table: &str) -> i64 {
    let row = db
        .query_one(&Query::new(format!("SELECT COUNT(*) AS n FROM {table}")))
        .await
        .unwrap();
    row.get("n").and_then(Value::as_i64).unwrap()
}

async fn seed_forum(db: &Database<MemoryScripts>) {
    db.execute(
        &Query::new("INSERT INTO forums (slug, title) VALUES (?, ?)")
            .bind("rust")
            .bind("Rust"),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_committed_work_is_visible_to_other_pools() {
    let file = NamedTempFile::new().unwrap();
    let writer = open_database(&file, 1).await;
    let reader = open_database(&file, 1).await;

    let outcome = writer
        .execute(
            &Query::new("INSERT INTO forums (slug, title) VALUES (?, ?)")
                .bind("rust")
                .bind("Rust"),
        )
        .await
        .unwrap();

    assert_eq!(outcome.rows_affected, 1);
    assert!(outcome.last_insert_id.is_some());
    assert_eq!(count(&reader, "forums").await, 1);

    writer.close().await.unwrap();
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_query_one_materializes_values() {
    let file = NamedTempFile::new().unwrap();
    let db = open_database(&file, 1).await;
    seed_forum(&db).await;
    db.execute(
        &Query::new(
            "INSERT INTO threads (id, forum, title, votes, attachment) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(7)
        .bind("rust")
        .bind("Borrowing")
        .bind(2.5)
        .bind(vec![0xCA_u8, 0xFE]),
    )
    .await
    .unwrap();

    let row = db
        .query_one(
            &Query::new("SELECT id, title, votes, attachment, NULL AS missing FROM threads WHERE id = ?")
                .bind(7),
        )
        .await
        .unwrap();

    // The row is owned; closing the pool must not invalidate it.
    db.close().await.unwrap();

    assert_eq!(
        row.columns(),
        &["id", "title", "votes", "attachment", "missing"]
    );
    assert_eq!(row.get("id"), Some(&Value::Int(7)));
    assert_eq!(row.get("title"), Some(&Value::Text("Borrowing".into())));
    assert_eq!(row.get("votes"), Some(&Value::Float(2.5)));
    assert_eq!(row.get("attachment"), Some(&Value::Bytes(vec![0xCA, 0xFE])));
    assert_eq!(row.get("missing"), Some(&Value::Null));
}

#[tokio::test]
async fn test_query_one_without_rows() {
    let file = NamedTempFile::new().unwrap();
    let db = open_database(&file, 1).await;

    let result = db
        .query_one(&Query::new("SELECT slug FROM forums WHERE slug = ?").bind("nope"))
        .await;

    assert!(matches!(result, Err(DbError::NoRows)));
    // The connection went back to the pool without an open transaction.
    seed_forum(&db).await;
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_query_one_takes_first_row() {
    let file = NamedTempFile::new().unwrap();
    let db = open_database(&file, 1).await;
    for slug in ["b", "a", "c"] {
        db.execute(
            &Query::new("INSERT INTO forums (slug, title) VALUES (?, ?)")
                .bind(slug)
                .bind(slug.to_uppercase()),
        )
        .await
        .unwrap();
    }

    let row = db
        .query_one(&Query::new("SELECT slug FROM forums ORDER BY slug"))
        .await
        .unwrap();

    assert_eq!(row.get("slug").and_then(Value::as_str), Some("a"));
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_query_many_returns_rows_in_order() {
    let file = NamedTempFile::new().unwrap();
    let db = open_database(&file, 1).await;

    let empty = db
        .query_many(&Query::new("SELECT slug FROM forums"))
        .await
        .unwrap();
    assert!(empty.is_empty());

    for slug in ["go", "rust", "zig"] {
        db.execute(
            &Query::new("INSERT INTO forums (slug, title) VALUES (?, ?)")
                .bind(slug)
                .bind(slug),
        )
        .await
        .unwrap();
    }

    let rows = db
        .query_many(&Query::new("SELECT slug, title FROM forums ORDER BY slug DESC"))
        .await
        .unwrap();

    let slugs: Vec<&str> = rows
        .iter()
        .filter_map(|r| r.get("slug").and_then(Value::as_str))
        .collect();
    assert_eq!(slugs, vec!["zig", "rust", "go"]);
    assert!(rows.iter().all(|r| r.len() == 2));
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_execute_reports_affected_rows() {
    let file = NamedTempFile::new().unwrap();
    let db = open_database(&file, 1).await;
    for slug in ["a", "b", "c"] {
        db.execute(
            &Query::new("INSERT INTO forums (slug, title) VALUES (?, 'old')").bind(slug),
        )
        .await
        .unwrap();
    }

    let outcome = db
        .execute(&Query::new("UPDATE forums SET title = ? WHERE slug <> ?").bind("new").bind("a"))
        .await
        .unwrap();

    assert_eq!(outcome.rows_affected, 2);
    assert_eq!(outcome.last_insert_id, None);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_ignored_insert_reports_no_insert_id() {
    let file = NamedTempFile::new().unwrap();
    let db = open_database(&file, 1).await;
    seed_forum(&db).await;

    let ignored = db
        .execute(
            &Query::new("INSERT OR IGNORE INTO forums (slug, title) VALUES (?, ?)")
                .bind("rust")
                .bind("Again"),
        )
        .await
        .unwrap();

    assert_eq!(ignored.rows_affected, 0);
    assert_eq!(ignored.last_insert_id, None);

    let inserted = db
        .execute(
            &Query::new("INSERT OR IGNORE INTO forums (slug, title) VALUES (?, ?)")
                .bind("go")
                .bind("Go"),
        )
        .await
        .unwrap();
    assert_eq!(inserted.rows_affected, 1);
    assert!(inserted.last_insert_id.is_some());
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_execute_rolls_back() {
    let file = NamedTempFile::new().unwrap();
    // A single connection: a transaction left open would break the next call.
    let db = open_database(&file, 1).await;
    seed_forum(&db).await;

    let duplicate = db
        .execute(
            &Query::new("INSERT INTO forums (slug, title) VALUES (?, ?)")
                .bind("rust")
                .bind("Again"),
        )
        .await;

    match duplicate {
        Err(DbError::Execution { sql_state, .. }) => assert!(sql_state.is_some()),
        other => panic!("expected execution error, got {:?}", other),
    }

    let row = db
        .query_one(&Query::new("SELECT title FROM forums WHERE slug = 'rust'"))
        .await
        .unwrap();
    assert_eq!(row.get("title").and_then(Value::as_str), Some("Rust"));

    seed_forum_named(&db, "go").await;
    assert_eq!(count(&db, "forums").await, 2);
    db.close().await.unwrap();
}

async fn seed_forum_named(db: &Database<MemoryScripts>, slug: &str) {
    db.execute(
        &Query::new("INSERT INTO forums (slug, title) VALUES (?, ?)")
            .bind(slug)
            .bind(slug),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_failed_query_many_leaves_pool_usable() {
    let file = NamedTempFile::new().unwrap();
    let db = open_database(&file, 1).await;

    let result = db
        .query_many(&Query::new("SELECT no_such_column FROM forums"))
        .await;

    assert!(matches!(result, Err(DbError::Execution { .. })));
    assert_eq!(count(&db, "forums").await, 0);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_commit_failure_is_reported_and_rolled_back() {
    let file = NamedTempFile::new().unwrap();
    let db = open_database(&file, 1).await;

    // The foreign key is deferred, so the statement succeeds and COMMIT fails.
    let result = db
        .execute(
            &Query::new("INSERT INTO threads (id, forum, title) VALUES (?, ?, ?)")
                .bind(1)
                .bind("missing")
                .bind("Orphan"),
        )
        .await;

    match &result {
        Err(DbError::Commit { message, .. }) => {
            assert!(message.to_lowercase().contains("foreign key"));
        }
        other => panic!("expected commit error, got {:?}", other),
    }

    assert_eq!(count(&db, "threads").await, 0);

    seed_forum(&db).await;
    db.execute(
        &Query::new("INSERT INTO threads (id, forum, title) VALUES (?, ?, ?)")
            .bind(1)
            .bind("rust")
            .bind("Adopted"),
    )
    .await
    .unwrap();
    assert_eq!(count(&db, "threads").await, 1);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_calls_are_isolated() {
    let file = NamedTempFile::new().unwrap();
    let db = Arc::new(open_database(&file, 4).await);
    seed_forum(&db).await;

    let mut handles = Vec::new();
    for id in 0..16_i64 {
        let db = Arc::clone(&db);
        handles.push(tokio::spawn(async move {
            db.execute(
                &Query::new("INSERT INTO threads (id, forum, title) VALUES (?, 'rust', ?)")
                    .bind(id)
                    .bind(format!("thread {id}")),
            )
            .await?;
            db.query_one(&Query::new("SELECT title FROM threads WHERE id = ?").bind(id))
                .await
        }));
    }

    // One call fails; the others must not be affected by it.
    let failing = {
        let db = Arc::clone(&db);
        tokio::spawn(async move {
            db.execute(&Query::new(
                "INSERT INTO threads (id, forum, title) VALUES (1000, 'rust', NULL)",
            ))
            .await
        })
    };

    for (id, handle) in handles.into_iter().enumerate() {
        let row = handle.await.unwrap().unwrap();
        assert_eq!(
            row.get("title").and_then(Value::as_str),
            Some(format!("thread {id}").as_str())
        );
    }
    assert!(matches!(
        failing.await.unwrap(),
        Err(DbError::Execution { .. })
    ));

    assert_eq!(count(&db, "threads").await, 16);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_calls_after_close_are_not_initialized() {
    let file = NamedTempFile::new().unwrap();
    let db = open_database(&file, 1).await;
    db.close().await.unwrap();

    let result = db.query_many(&Query::new("SELECT slug FROM forums")).await;
    assert!(matches!(result, Err(DbError::NotInitialized)));
}
