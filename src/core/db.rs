use std::str::FromStr;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::follow::follow_user;
use crate::groups::{create_group, find_group_by_slug};
use crate::posts::{create_post, NewPost};
use crate::users::{create_user, find_user_by_username};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS groups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        pub_date TEXT NOT NULL,
        author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        group_id INTEGER REFERENCES groups(id) ON DELETE SET NULL,
        image TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        text TEXT NOT NULL,
        created TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS follows (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        UNIQUE (user_id, author_id),
        CHECK (user_id <> author_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_posts_pub_date ON posts(pub_date DESC, id DESC)",
    "CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id)",
    "CREATE INDEX IF NOT EXISTS idx_posts_group ON posts(group_id)",
    "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id)",
    "CREATE INDEX IF NOT EXISTS idx_follows_author ON follows(author_id)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
];

/// Opens (creating if needed) the database at `url` and applies the schema.
pub async fn connect(url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid database url {}", url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database {}", url))?;

    migrate(&pool).await?;
    Ok(pool)
}

/// A private in-memory database. The pool keeps exactly one connection open
/// for its whole life, since every SQLite memory connection is its own database.
pub async fn connect_in_memory() -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("failed to open in-memory database")?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("failed to apply schema statement: {}", statement.trim()))?;
    }
    tracing::debug!(statements = SCHEMA.len(), "database schema ready");
    Ok(())
}

/// Seeds a small demo data set. Running it twice leaves the data unchanged.
pub async fn init_demo_data(pool: &SqlitePool) -> anyhow::Result<()> {
    let group = match find_group_by_slug(pool, "first-steps").await? {
        Some(group) => group,
        None => {
            create_group(
                pool,
                "First steps",
                "first-steps",
                "Introductions and <em>hello world</em> posts.",
            )
            .await?
        }
    };

    let demo_users = [
        ("test", "test-password", vec!["This is my first post here!"]),
        (
            "alice",
            "alice-password",
            vec![
                "Welcome to my blog! Excited to share thoughts here.",
                "Just finished an amazing project. Feeling productive today!",
            ],
        ),
        (
            "bob",
            "bob-password",
            vec!["Hey everyone! Just joined, looking forward to connecting with you all."],
        ),
    ];

    let mut ids = Vec::with_capacity(demo_users.len());
    for (username, password, texts) in demo_users {
        if let Some(existing) = find_user_by_username(pool, username).await? {
            ids.push(existing.id);
            continue;
        }

        let user = create_user(pool, username, password).await?;
        for text in texts {
            create_post(
                pool,
                NewPost {
                    author_id: user.id,
                    text: text.to_string(),
                    group_id: Some(group.id),
                    image: None,
                },
            )
            .await?;
        }
        ids.push(user.id);
    }

    // test follows bob
    follow_user(pool, ids[0], ids[2]).await?;

    tracing::info!(users = ids.len(), "demo data ready");
    Ok(())
}
