use std::str::FromStr;
use std::time::Duration;

use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::config::{DatabaseConfig, UserSeed};

/// Opens the SQLite pool, creating the database file if needed.
pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&cfg.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Ownership and relation cascades depend on this
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            is_staff INTEGER NOT NULL DEFAULT 0,
            token_hash TEXT NULL UNIQUE
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            price_cents INTEGER NOT NULL,
            author_name TEXT NOT NULL,
            owner_id INTEGER NULL,
            FOREIGN KEY(owner_id) REFERENCES users(id) ON DELETE SET NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS user_book_relations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            book_id INTEGER NOT NULL,
            liked INTEGER NOT NULL DEFAULT 0,
            in_bookmarks INTEGER NOT NULL DEFAULT 0,
            rating INTEGER NULL CHECK (rating IS NULL OR rating BETWEEN 1 AND 5),
            UNIQUE(user_id, book_id),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(book_id) REFERENCES books(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        ("idx_books_price", "CREATE INDEX IF NOT EXISTS idx_books_price ON books(price_cents)"),
        ("idx_books_owner", "CREATE INDEX IF NOT EXISTS idx_books_owner ON books(owner_id)"),
        ("idx_relations_book", "CREATE INDEX IF NOT EXISTS idx_relations_book ON user_book_relations(book_id)"),
    ];
    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            tracing::warn!("Failed to create index {}: {}", name, e);
        }
    }

    Ok(())
}

/// Hex-encoded SHA-256 of a bearer token. Only the hash is stored.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{:x}", digest)
}

/// Inserts or refreshes a configured identity, keyed by username. Returns the user id.
pub async fn upsert_user(pool: &SqlitePool, seed: &UserSeed) -> anyhow::Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"INSERT INTO users (username, first_name, last_name, is_staff, token_hash)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT(username) DO UPDATE SET
               first_name = excluded.first_name,
               last_name = excluded.last_name,
               is_staff = excluded.is_staff,
               token_hash = excluded.token_hash
           RETURNING id"#,
    )
    .bind(seed.username.trim())
    .bind(&seed.first_name)
    .bind(&seed.last_name)
    .bind(seed.is_staff)
    .bind(hash_token(&seed.token))
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn seed_users(pool: &SqlitePool, seeds: &[UserSeed]) -> anyhow::Result<()> {
    for seed in seeds {
        let id = upsert_user(pool, seed).await?;
        tracing::info!(user_id = id, username = %seed.username, staff = seed.is_staff, "seeded user");
    }
    Ok(())
}
